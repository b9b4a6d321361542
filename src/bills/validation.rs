//! Input checks run before any provider call or store write

use crate::error::ValidationError;
use bigdecimal::BigDecimal;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9]{10,14}$").unwrap();
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref ACCOUNT_NUMBER_REGEX: Regex = Regex::new(r"^[0-9]{6,20}$").unwrap();
}

pub fn require(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(())
}

pub fn require_positive_amount(amount: &BigDecimal) -> Result<(), ValidationError> {
    if *amount <= BigDecimal::from(0) {
        return Err(ValidationError::InvalidAmount {
            amount: amount.to_string(),
            reason: "Amount must be greater than zero".to_string(),
        });
    }
    Ok(())
}

pub fn validate_phone(field: &str, phone: &str) -> Result<(), ValidationError> {
    require(field, phone)?;
    if !PHONE_REGEX.is_match(phone.trim()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "Expected 10 to 14 digits, optionally prefixed with '+'".to_string(),
        });
    }
    Ok(())
}

/// Format check for a phone the caller may leave out.
pub fn validate_optional_phone(field: &str, phone: &str) -> Result<(), ValidationError> {
    if phone.trim().is_empty() {
        return Ok(());
    }
    validate_phone(field, phone)
}

/// E-mail is optional everywhere, but must be well formed when given.
pub fn validate_optional_email(email: Option<&str>) -> Result<(), ValidationError> {
    match email.map(str::trim).filter(|e| !e.is_empty()) {
        Some(email) if !EMAIL_REGEX.is_match(email) => Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "Not a valid e-mail address".to_string(),
        }),
        _ => Ok(()),
    }
}

/// Meter, smartcard and similar numeric account identifiers.
pub fn validate_account_number(field: &str, value: &str) -> Result<(), ValidationError> {
    require(field, value)?;
    if !ACCOUNT_NUMBER_REGEX.is_match(value.trim()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "Expected 6 to 20 digits".to_string(),
        });
    }
    Ok(())
}

pub fn require_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), ValidationError> {
    if !allowed.contains(&value.trim().to_lowercase().as_str()) {
        return Err(ValidationError::UnsupportedValue {
            field: field.to_string(),
            value: value.to_string(),
            allowed: allowed.iter().map(|v| v.to_string()).collect(),
        });
    }
    Ok(())
}

/// Partition key for listing: the e-mail when given, otherwise the phone.
pub fn user_identifier(email: Option<&str>, phone: &str) -> String {
    email
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| phone.trim())
        .to_string()
}
