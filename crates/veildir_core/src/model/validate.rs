//! Request field validation.
//!
//! # Responsibility
//! - Reject malformed draft input before any crypto or storage work runs.
//! - Keep one shared error shape for all draft validation failures.
//!
//! # Invariants
//! - Validation never transforms values; digests are computed over the exact
//!   text the caller supplied.
//! - Error messages name the field, never the rejected value.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .expect("valid email regex")
});
static DOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("valid domain regex")
});

/// Validation failure for one draft field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValidationError {
    /// Field is missing, empty, or whitespace-only.
    MissingField(&'static str),
    /// Field exceeds its maximum length in characters.
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
    /// Field does not match its required shape.
    InvalidFormat {
        field: &'static str,
        expected: &'static str,
    },
}

impl Display for FieldValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "required field `{field}` is blank"),
            Self::TooLong { field, max, actual } => {
                write!(f, "field `{field}` exceeds {max} chars (got {actual})")
            }
            Self::InvalidFormat { field, expected } => {
                write!(f, "field `{field}` is not {expected}")
            }
        }
    }
}

impl Error for FieldValidationError {}

/// Checks that a free-text field is non-blank and within its length cap.
pub fn require_text(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), FieldValidationError> {
    if value.trim().is_empty() {
        return Err(FieldValidationError::MissingField(field));
    }
    let actual = value.chars().count();
    if actual > max {
        return Err(FieldValidationError::TooLong { field, max, actual });
    }
    Ok(())
}

/// Checks that a field holds a plausible email address.
pub fn require_email(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), FieldValidationError> {
    require_text(field, value, max)?;
    if !EMAIL_RE.is_match(value) {
        return Err(FieldValidationError::InvalidFormat {
            field,
            expected: "a valid email address",
        });
    }
    Ok(())
}

/// Checks that a field holds a plausible DNS domain name.
pub fn require_domain(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), FieldValidationError> {
    require_text(field, value, max)?;
    if !DOMAIN_RE.is_match(value) {
        return Err(FieldValidationError::InvalidFormat {
            field,
            expected: "a valid domain name",
        });
    }
    Ok(())
}
