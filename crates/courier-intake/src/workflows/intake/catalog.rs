//! Field catalog: the ordered collection states, their prompts and fixed reply menus.

use serde::{Serialize, Serializer};

use super::domain::{
    EmploymentPeriod, PriorEmployment, RegistrationChoice, SelfEmployment, Transport,
};

/// Fixed menu of literal reply strings, laid out in keyboard rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceSet(pub &'static [&'static [&'static str]]);

impl ChoiceSet {
    pub fn contains(&self, raw: &str) -> bool {
        self.labels().any(|label| label == raw)
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> {
        self.0.iter().flat_map(|row| row.iter().copied())
    }

    pub fn rows(&self) -> &'static [&'static [&'static str]] {
        self.0
    }
}

impl Serialize for ChoiceSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

pub const DOMESTIC_CHOICE: &str = "🇷🇺 Russian Federation";
pub const REGIONAL_CHOICE: &str = "🌍 CIS / Other";
/// Citizenship recorded for the domestic choice.
pub const DOMESTIC_CITIZENSHIP: &str = "🇷🇺 Russia";

pub const OTHER_COUNTRY_CHOICE: &str = "🌍 Other country";
pub const SKIP_CHOICE: &str = "🚫 Skip";
pub const FOREIGN_PREFIX: &str = "🌍";
pub const UNSPECIFIED_COUNTRY: &str = "Not specified";

pub const REGIONAL_COUNTRIES: &[&str] = &[
    "🇧🇾 Belarus",
    "🇰🇿 Kazakhstan",
    "🇺🇿 Uzbekistan",
    "🇦🇲 Armenia",
    "🇦🇿 Azerbaijan",
    "🇲🇩 Moldova",
    "🇰🇬 Kyrgyzstan",
    "🇹🇯 Tajikistan",
];

pub const CONFIRM_CHOICE: &str = "✅ Confirm";
pub const EDIT_CHOICE: &str = "✏️ Edit";
pub const BACK_CHOICE: &str = "Back";

pub const SELF_EMPLOYMENT_APP_URL: &str = "https://npd.nalog.ru/";

pub const CITIZENSHIP_CHOICES: ChoiceSet = ChoiceSet(&[&[DOMESTIC_CHOICE, REGIONAL_CHOICE]]);
pub const REGION_CHOICES: ChoiceSet = ChoiceSet(&[
    &["🇧🇾 Belarus", "🇰🇿 Kazakhstan"],
    &["🇺🇿 Uzbekistan", "🇦🇲 Armenia"],
    &["🇦🇿 Azerbaijan", "🇲🇩 Moldova"],
    &["🇰🇬 Kyrgyzstan", "🇹🇯 Tajikistan"],
    &[OTHER_COUNTRY_CHOICE, SKIP_CHOICE],
]);
pub const COUNTRY_CHOICES: ChoiceSet = ChoiceSet(&[&[SKIP_CHOICE]]);
pub const PRIOR_EMPLOYMENT_CHOICES: ChoiceSet = ChoiceSet(&[&[
    PriorEmployment::Yes.label(),
    PriorEmployment::No.label(),
]]);
pub const EMPLOYMENT_PERIOD_CHOICES: ChoiceSet = ChoiceSet(&[
    &[EmploymentPeriod::Recent.label()],
    &[EmploymentPeriod::Earlier.label()],
]);
pub const SELF_EMPLOYMENT_CHOICES: ChoiceSet = ChoiceSet(&[&[
    SelfEmployment::Registered.label(),
    SelfEmployment::NotRegistered.label(),
]]);
pub const REGISTRATION_CHOICES: ChoiceSet = ChoiceSet(&[&[
    RegistrationChoice::RegisterNow.label(),
    RegistrationChoice::AtOffice.label(),
]]);
pub const TRANSPORT_CHOICES: ChoiceSet = ChoiceSet(&[&[
    Transport::Car.label(),
    Transport::Bicycle.label(),
    Transport::ElectricBicycle.label(),
]]);
pub const CONFIRM_CHOICES: ChoiceSet = ChoiceSet(&[&[CONFIRM_CHOICE, EDIT_CHOICE]]);
pub const EDIT_FIELD_CHOICES: ChoiceSet = ChoiceSet(&[
    &[EditableField::FullName.label(), EditableField::Phone.label()],
    &[EditableField::City.label(), EditableField::Age.label()],
    &[EditableField::Transport.label(), BACK_CHOICE],
]);

/// Collection states, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormState {
    Citizenship,
    CitizenshipRegion,
    CitizenshipOther,
    FullName,
    PriorEmployment,
    EmploymentPeriod,
    Phone,
    City,
    Age,
    SelfEmployment,
    RegistrationChoice,
    Transport,
    Confirmation,
    EditField,
}

impl FormState {
    pub const fn prompt(self) -> &'static str {
        match self {
            FormState::Citizenship => {
                "🌟 Welcome to the courier team! 🌟\nChoose your citizenship:"
            }
            FormState::CitizenshipRegion => "🌐 Choose your country:",
            FormState::CitizenshipOther => "🌐 Enter your citizenship:",
            FormState::FullName => "👤 Enter your full name:",
            FormState::PriorEmployment => "📋 Have you worked with us before?",
            FormState::EmploymentPeriod => "📆 When did your previous employment end?",
            FormState::Phone => "📱 Enter your phone number (starting with +7, 7 or 8):",
            FormState::City => "🏙️ Enter your city:",
            FormState::Age => "📅 Enter your age:",
            FormState::SelfEmployment => "📄 Are you registered as self-employed?",
            FormState::RegistrationChoice => "🛠️ Would you like to register now?",
            FormState::Transport => "🚗 Choose your transport:",
            FormState::Confirmation => "Is everything correct?",
            FormState::EditField => "Choose the field to change:",
        }
    }

    /// Reply menu shown with the prompt, if the state only accepts fixed labels.
    pub const fn choices(self) -> Option<ChoiceSet> {
        match self {
            FormState::Citizenship => Some(CITIZENSHIP_CHOICES),
            FormState::CitizenshipRegion => Some(REGION_CHOICES),
            FormState::CitizenshipOther => Some(COUNTRY_CHOICES),
            FormState::PriorEmployment => Some(PRIOR_EMPLOYMENT_CHOICES),
            FormState::EmploymentPeriod => Some(EMPLOYMENT_PERIOD_CHOICES),
            FormState::SelfEmployment => Some(SELF_EMPLOYMENT_CHOICES),
            FormState::RegistrationChoice => Some(REGISTRATION_CHOICES),
            FormState::Transport => Some(TRANSPORT_CHOICES),
            FormState::Confirmation => Some(CONFIRM_CHOICES),
            FormState::EditField => Some(EDIT_FIELD_CHOICES),
            FormState::FullName | FormState::Phone | FormState::City | FormState::Age => None,
        }
    }
}

/// Fields offered by the edit menu on the confirmation screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditableField {
    FullName,
    Phone,
    City,
    Age,
    Transport,
}

impl EditableField {
    pub const ALL: [EditableField; 5] = [
        EditableField::FullName,
        EditableField::Phone,
        EditableField::City,
        EditableField::Age,
        EditableField::Transport,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            EditableField::FullName => "Full name",
            EditableField::Phone => "Phone",
            EditableField::City => "City",
            EditableField::Age => "Age",
            EditableField::Transport => "Transport",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.label() == raw)
    }

    /// Collection state that re-collects this field.
    pub const fn state(self) -> FormState {
        match self {
            EditableField::FullName => FormState::FullName,
            EditableField::Phone => FormState::Phone,
            EditableField::City => FormState::City,
            EditableField::Age => FormState::Age,
            EditableField::Transport => FormState::Transport,
        }
    }
}

/// Answer to the regional citizenship menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionAnswer {
    Country(&'static str),
    OtherCountry,
    Skip,
}

impl RegionAnswer {
    pub fn from_label(raw: &str) -> Option<Self> {
        match raw {
            OTHER_COUNTRY_CHOICE => Some(Self::OtherCountry),
            SKIP_CHOICE => Some(Self::Skip),
            _ => REGIONAL_COUNTRIES
                .iter()
                .copied()
                .find(|country| *country == raw)
                .map(Self::Country),
        }
    }
}

/// Citizenship label recorded for a free-text or skipped foreign country.
pub fn foreign_citizenship(country: Option<&str>) -> String {
    format!("{FOREIGN_PREFIX} {}", country.unwrap_or(UNSPECIFIED_COUNTRY))
}

pub const SELF_EMPLOYMENT_INSTRUCTIONS: &str = "📋 How to register as self-employed:\n\n\
1. Download the «Мой налог» app from the Federal Tax Service 📲\n\
2. Fill in your passport details, SNILS/INN and phone number\n\
3. Upload photos of the main passport page and the registration page 📷\n\
4. Submit for verification ✅\n\
5. Receive the certificate within 1-3 days 🎉";
