//! Field normalization and validation helpers shared by record drafts.
//!
//! Every rule here runs before a store lock is ever acquired: a draft that
//! fails validation never touches the filesystem and never contends with
//! writers. Helpers take the field name so errors can point at the offending
//! field, and they normalize on the way in. Records hold canonical values,
//! so uniqueness comparison never has to re-normalize stored data.

use crate::error::{Result, StoreError};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern"));

/// Trim a required field, rejecting empty or whitespace-only input.
pub fn required(field: &'static str, raw: &str) -> Result<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(StoreError::Validation {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(value.to_string())
}

/// Normalize and shape-check a required e-mail address.
pub fn email(field: &'static str, raw: &str) -> Result<String> {
    let value = raw.trim().to_lowercase();
    if value.is_empty() {
        return Err(StoreError::Validation {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if !EMAIL_SHAPE.is_match(&value) {
        return Err(StoreError::Validation {
            field,
            reason: format!("\"{}\" is not a valid e-mail address", value),
        });
    }
    Ok(value)
}

/// Like [`email`], but an empty value is allowed and normalizes to `""`.
pub fn optional_email(field: &'static str, raw: &str) -> Result<String> {
    if raw.trim().is_empty() {
        return Ok(String::new());
    }
    email(field, raw)
}

/// Strip everything but ASCII digits. `"+91 90000-00001"` becomes
/// `"919000000001"`. This is the canonical comparison form for phone keys.
pub fn digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalize a required phone number to digits, enforcing a minimum count.
pub fn phone(field: &'static str, raw: &str, min_digits: usize) -> Result<String> {
    let value = digits(raw);
    if value.len() < min_digits {
        return Err(StoreError::Validation {
            field,
            reason: format!("must contain at least {} digits", min_digits),
        });
    }
    Ok(value)
}

/// Like [`phone`], but an empty value is allowed and normalizes to `""`.
pub fn optional_phone(field: &'static str, raw: &str, min_digits: usize) -> Result<String> {
    if raw.trim().is_empty() {
        return Ok(String::new());
    }
    phone(field, raw, min_digits)
}

/// Coerce a numeric-looking string into a positive decimal.
pub fn positive_decimal(field: &'static str, raw: &str) -> Result<f64> {
    let value: f64 = raw.trim().parse().map_err(|_| StoreError::Validation {
        field,
        reason: format!("\"{}\" is not a number", raw.trim()),
    })?;
    if value <= 0.0 {
        return Err(StoreError::Validation {
            field,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
