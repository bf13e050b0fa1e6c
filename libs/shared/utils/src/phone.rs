use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PhoneError {
    #[error("Phone number is empty")]
    Empty,

    #[error("Phone number '{0}' is not a valid international number")]
    Invalid(String),
}

fn international_number() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+[1-9]\d{7,14}$").expect("phone pattern is a valid regex"))
}

/// Normalizes a stored phone number into the `+<country><number>` form the
/// messaging provider expects. Spaces, dashes, dots and parentheses are
/// dropped and a missing `+` is added. A `00` international prefix is
/// treated as `+`.
pub fn normalize_phone(raw: &str) -> Result<String, PhoneError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PhoneError::Empty);
    }

    let compact: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    let digits = compact
        .strip_prefix('+')
        .or_else(|| compact.strip_prefix("00"))
        .unwrap_or(&compact);
    let normalized = format!("+{}", digits);

    if international_number().is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(PhoneError::Invalid(raw.to_string()))
    }
}
