//! Application data model: identities, answer enums, completed fields and stored records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Surrogate identifier assigned by the application store on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub i64);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque numeric identity supplied by the conversation channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The person filling in the form, as reported by the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submitter {
    pub user_id: UserId,
    pub username: Option<String>,
}

impl Submitter {
    pub fn new(user_id: UserId, username: Option<String>) -> Self {
        Self {
            user_id,
            username: username.filter(|name| !name.trim().is_empty()),
        }
    }

    pub fn handle(&self) -> String {
        match &self.username {
            Some(name) => format!("@{}", name.trim_start_matches('@')),
            None => "not specified".to_string(),
        }
    }
}

/// Lifecycle status of a persisted application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    New,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::New => "new",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Only `new` may be left, and only towards a decision.
    pub const fn can_transition_to(self, next: ApplicationStatus) -> bool {
        matches!(
            (self, next),
            (ApplicationStatus::New, ApplicationStatus::Approved)
                | (ApplicationStatus::New, ApplicationStatus::Rejected)
        )
    }

    pub const fn ordered() -> [Self; 3] {
        [Self::New, Self::Approved, Self::Rejected]
    }
}

macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $label:expr),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            /// Exact match against the fixed reply labels; no normalization.
            pub fn from_label(raw: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|value| value.label() == raw)
            }
        }
    };
}

labelled_enum! {
    /// Whether the applicant worked for the company before.
    PriorEmployment {
        Yes => "✅ Yes",
        No => "❌ No",
    }
}

labelled_enum! {
    /// How long ago the previous employment ended.
    EmploymentPeriod {
        Recent => "📅 Less than 40 days ago",
        Earlier => "🗓️ More than 40 days ago",
    }
}

labelled_enum! {
    /// Self-employed (tax) registration status.
    SelfEmployment {
        Registered => "✅ Yes",
        NotRegistered => "❌ No",
    }
}

labelled_enum! {
    /// Where an unregistered applicant intends to obtain the status.
    RegistrationChoice {
        RegisterNow => "📝 Register now",
        AtOffice => "🏢 At the office",
    }
}

labelled_enum! {
    Transport {
        Car => "🚗 Car",
        Bicycle => "🚲 Bicycle",
        ElectricBicycle => "⚡ E-bike",
    }
}

/// Validated field set handed to the store on submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationFields {
    pub full_name: String,
    pub citizenship: String,
    pub prior_employment: PriorEmployment,
    pub employment_period: Option<EmploymentPeriod>,
    pub phone: String,
    pub city: String,
    pub age: u8,
    pub self_employment: SelfEmployment,
    pub registration: Option<RegistrationChoice>,
    pub transport: Transport,
}

impl ApplicationFields {
    /// Check the required-field and dependent-field invariants.
    pub fn ensure_complete(&self) -> Result<(), FieldViolation> {
        let required = [
            ("citizenship", &self.citizenship),
            ("full_name", &self.full_name),
            ("phone", &self.phone),
            ("city", &self.city),
        ];
        if let Some(field) = required
            .iter()
            .find(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
        {
            return Err(FieldViolation::Missing(field));
        }
        if self.age == 0 {
            return Err(FieldViolation::Missing("age"));
        }

        match (self.prior_employment, self.employment_period) {
            (PriorEmployment::Yes, None) => return Err(FieldViolation::Missing("employment_period")),
            (PriorEmployment::No, Some(_)) => {
                return Err(FieldViolation::Unexpected("employment_period"))
            }
            _ => {}
        }

        match (self.self_employment, self.registration) {
            (SelfEmployment::NotRegistered, None) => Err(FieldViolation::Missing("registration")),
            (SelfEmployment::Registered, Some(_)) => Err(FieldViolation::Unexpected("registration")),
            _ => Ok(()),
        }
    }
}

/// Reason an [`ApplicationFields`] value breaks a record invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FieldViolation {
    #[error("required field `{0}` is missing")]
    Missing(&'static str),
    #[error("field `{0}` must not be set for this answer")]
    Unexpected(&'static str),
}

/// Non-authoritative notes surfaced to the moderator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisories {
    pub recently_employed: bool,
    pub underage: bool,
}

impl Advisories {
    pub fn any(&self) -> bool {
        self.recently_employed || self.underage
    }
}

/// A durable, submitted application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub submitter: Submitter,
    pub fields: ApplicationFields,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

/// Projection used by the moderation workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusAndOwner {
    pub status: ApplicationStatus,
    pub submitter_id: UserId,
    pub full_name: String,
}

/// Row of the "recent new applications" report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentApplication {
    pub id: ApplicationId,
    pub created_at: DateTime<Utc>,
    pub city: String,
}
