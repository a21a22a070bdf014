//! Member domain model.
//!
//! # Responsibility
//! - Define the member registration draft and its searchable attribute tag.
//!
//! # Invariants
//! - `email` is the only sensitive member attribute; it is unique across
//!   live members, including withdrawn ones.
//! - `password_hash` is an opaque upstream credential hash; it never enters
//!   the encryption or digest paths.

use crate::model::validate::{require_email, require_text, FieldValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable surrogate identifier for a member aggregate.
pub type MemberId = Uuid;

const MAX_EMAIL_CHARS: usize = 100;
const MAX_PASSWORD_HASH_CHARS: usize = 100;
const MAX_COMPANY_DOMAIN_CHARS: usize = 50;

/// Searchable encrypted attribute of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberAttribute {
    /// Login email address. Unique.
    Email,
}

impl MemberAttribute {
    /// All searchable member attributes, in index-row insertion order.
    pub const ALL: [MemberAttribute; 1] = [MemberAttribute::Email];

    /// Stable tag persisted in index rows and used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
        }
    }

    /// Whether a duplicate digest for this attribute must be rejected.
    pub fn is_unique(self) -> bool {
        matches!(self, Self::Email)
    }
}

/// Validates one plaintext value against its attribute's rules.
pub fn validate_member_attribute(
    attribute: MemberAttribute,
    value: &str,
) -> Result<(), FieldValidationError> {
    match attribute {
        MemberAttribute::Email => require_email("email", value, MAX_EMAIL_CHARS),
    }
}

/// Registration request for one member.
///
/// The joining company is referenced by its plaintext domain; the
/// registration path resolves it through the company blind index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDraft {
    pub company_domain: String,
    pub email: String,
    /// Already-hashed credential (bcrypt or equivalent), hashed upstream.
    pub password_hash: String,
}

impl MemberDraft {
    /// Validates every field before crypto or storage work.
    pub fn validate(&self) -> Result<(), FieldValidationError> {
        require_text(
            "company_domain",
            &self.company_domain,
            MAX_COMPANY_DOMAIN_CHARS,
        )?;
        validate_member_attribute(MemberAttribute::Email, &self.email)?;
        require_text("password_hash", &self.password_hash, MAX_PASSWORD_HASH_CHARS)?;
        Ok(())
    }
}

/// Validates a replacement password hash outside the draft shape.
pub fn validate_password_hash(value: &str) -> Result<(), FieldValidationError> {
    require_text("password_hash", value, MAX_PASSWORD_HASH_CHARS)
}
