use regex::Regex;
use std::sync::LazyLock;

use crate::error::ExpoError;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("valid regex"));
static PHONE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d\s\-\+\(\)\.]+$").expect("valid regex"));

pub const MIN_PHONE_DIGITS: usize = 10;

pub fn required(field: &str, value: &str) -> Result<(), ExpoError> {
    if value.trim().is_empty() {
        return Err(ExpoError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Length limit counted in characters, not bytes.
pub fn max_len(field: &str, value: &str, max: usize) -> Result<(), ExpoError> {
    if value.chars().count() > max {
        return Err(ExpoError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

pub fn opt_max_len(field: &str, value: Option<&str>, max: usize) -> Result<(), ExpoError> {
    value.map_or(Ok(()), |v| max_len(field, v, max))
}

/// Trims, checks the shape and lowercases.
pub fn normalize_email(raw: &str) -> Result<String, ExpoError> {
    let email = raw.trim();
    max_len("email", email, 255)?;
    if !EMAIL.is_match(email) {
        return Err(ExpoError::Validation("email is not a valid address".into()));
    }
    Ok(email.to_lowercase())
}

pub fn validate_phone(raw: &str) -> Result<(), ExpoError> {
    max_len("phone_number", raw, 50)?;
    if !PHONE_CHARS.is_match(raw) {
        return Err(ExpoError::Validation(
            "phone_number contains invalid characters".into(),
        ));
    }
    if raw.chars().filter(char::is_ascii_digit).count() < MIN_PHONE_DIGITS {
        return Err(ExpoError::Validation("phone_number is too short".into()));
    }
    Ok(())
}
