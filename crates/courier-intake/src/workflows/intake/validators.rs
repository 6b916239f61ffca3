//! Per-field validators. Each takes the raw reply and either returns the normalized
//! value or a [`Rejection`] carrying the re-prompt text.

use super::cities;

/// Re-prompt text returned when a reply fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection(pub &'static str);

impl Rejection {
    pub fn message(&self) -> &'static str {
        self.0
    }
}

pub const FULL_NAME_REJECTION: Rejection =
    Rejection("❌ Enter your full name as: Surname Name Patronymic (e.g. Ivanov Ivan Ivanovich)");
pub const PHONE_REJECTION: Rejection = Rejection(
    "❌ Invalid phone number format. Examples:\n+79123456789\n79123456789\n89123456789",
);
pub const CITY_FORMAT_REJECTION: Rejection =
    Rejection("❌ Enter a valid city name without digits or special characters.");
pub const CITY_UNKNOWN_REJECTION: Rejection = Rejection(
    "❌ We do not operate in this city yet. Check the spelling or enter the nearest large city.",
);
pub const AGE_REJECTION: Rejection = Rejection("❌ Enter a valid age (a number from 14 to 100):");
pub const COUNTRY_REJECTION: Rejection =
    Rejection("❌ Enter the name of your country of citizenship or press skip.");
pub const CHOICE_REJECTION: Rejection = Rejection("Please choose an option from the keyboard.");

pub const MIN_AGE: i64 = 14;
pub const MAX_AGE: i64 = 100;
pub const ADULT_AGE: u8 = 18;

const COUNTRY_CODE: char = '7';
const TRUNK_PREFIX: char = '8';
const MAX_COUNTRY_LEN: usize = 64;

/// Accepted age along with the underage advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeAnswer {
    pub age: u8,
    pub underage: bool,
}

/// Two or three capitalised name parts, normalised to title case.
pub fn full_name(raw: &str) -> Result<String, Rejection> {
    let parts: Vec<&str> = raw.split_whitespace().collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(FULL_NAME_REJECTION);
    }
    if !parts.iter().all(|part| is_name_part(part)) {
        return Err(FULL_NAME_REJECTION);
    }

    Ok(parts
        .iter()
        .map(|part| title_case(part))
        .collect::<Vec<_>>()
        .join(" "))
}

fn is_name_part(part: &str) -> bool {
    let starts_upper = part.chars().next().is_some_and(char::is_uppercase);
    let letters = part.chars().filter(|c| c.is_alphabetic()).count();
    let charset_ok = part.chars().all(|c| c.is_alphabetic() || c == '-');
    let hyphens_internal =
        !part.starts_with('-') && !part.ends_with('-') && !part.contains("--");

    starts_upper && charset_ok && hyphens_internal && letters >= 2
}

/// Normalise to `+7 (XXX) XXX-XX-XX`, accepting the domestic trunk prefix.
pub fn phone(raw: &str) -> Result<String, Rejection> {
    let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if digits.len() == 11 && digits.starts_with(TRUNK_PREFIX) {
        digits.replace_range(..1, &COUNTRY_CODE.to_string());
    }
    if digits.len() != 11 || !digits.starts_with(COUNTRY_CODE) {
        return Err(PHONE_REJECTION);
    }

    Ok(format!(
        "+{} ({}) {}-{}-{}",
        &digits[..1],
        &digits[1..4],
        &digits[4..7],
        &digits[7..9],
        &digits[9..11]
    ))
}

/// Check against the city catalog; the stored value is the title-cased input.
pub fn city(raw: &str) -> Result<String, Rejection> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() < 2 {
        return Err(CITY_FORMAT_REJECTION);
    }
    if !collapsed
        .chars()
        .all(|c| c.is_alphabetic() || c == ' ' || c == '-')
    {
        return Err(CITY_FORMAT_REJECTION);
    }

    match cities::resolve(&city_key(&collapsed)) {
        Some(_) => Ok(title_case(&collapsed)),
        None => Err(CITY_UNKNOWN_REJECTION),
    }
}

fn city_key(value: &str) -> String {
    value
        .to_lowercase()
        .replace('ё', "е")
        .split(|c: char| c == ' ' || c == '-')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn age(raw: &str) -> Result<AgeAnswer, Rejection> {
    let value: i64 = raw.trim().parse().map_err(|_| AGE_REJECTION)?;
    if !(MIN_AGE..=MAX_AGE).contains(&value) {
        return Err(AGE_REJECTION);
    }
    let age = u8::try_from(value).map_err(|_| AGE_REJECTION)?;

    Ok(AgeAnswer {
        age,
        underage: age < ADULT_AGE,
    })
}

/// Free-text country entered after picking "other country".
pub fn country(raw: &str) -> Result<String, Rejection> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() || collapsed.chars().count() > MAX_COUNTRY_LEN {
        return Err(COUNTRY_REJECTION);
    }
    Ok(collapsed)
}

/// Exact match against a fixed label set.
pub fn choice<T>(raw: &str, parse: impl Fn(&str) -> Option<T>) -> Result<T, Rejection> {
    parse(raw).ok_or(CHOICE_REJECTION)
}

/// Uppercase the first letter of every space- or hyphen-separated segment.
pub(crate) fn title_case(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut at_segment_start = true;
    for c in value.chars() {
        if at_segment_start {
            result.extend(c.to_uppercase());
        } else {
            result.extend(c.to_lowercase());
        }
        at_segment_start = c == ' ' || c == '-';
    }
    result
}
