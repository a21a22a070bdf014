//! Company domain model.
//!
//! # Responsibility
//! - Define the company draft shape and its searchable attribute tags.
//! - Keep per-attribute validation rules in one place.
//!
//! # Invariants
//! - Every company attribute is sensitive: stored encrypted, searched via
//!   its digest, never persisted as plaintext.
//! - `domain` and `email` are unique across live companies; the remaining
//!   attributes are searchable but may collide.

use crate::model::validate::{require_domain, require_email, require_text, FieldValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable surrogate identifier for a company aggregate.
///
/// Index rows point at this key, never at ciphertext.
pub type CompanyId = Uuid;

const MAX_DOMAIN_CHARS: usize = 50;
const MAX_NAME_CHARS: usize = 100;
const MAX_EMAIL_CHARS: usize = 100;
const MAX_MOBILE_CHARS: usize = 20;
const MAX_ADDRESS_CHARS: usize = 200;

/// Searchable encrypted attribute of a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyAttribute {
    /// Company web domain, e.g. `nhn.com`. Unique.
    Domain,
    /// Display name.
    Name,
    /// Contact email address. Unique.
    Email,
    /// Contact phone number.
    Mobile,
    /// Postal address.
    Address,
}

impl CompanyAttribute {
    /// All searchable company attributes, in index-row insertion order.
    pub const ALL: [CompanyAttribute; 5] = [
        CompanyAttribute::Domain,
        CompanyAttribute::Name,
        CompanyAttribute::Email,
        CompanyAttribute::Mobile,
        CompanyAttribute::Address,
    ];

    /// Stable tag persisted in index rows and used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Name => "name",
            Self::Email => "email",
            Self::Mobile => "mobile",
            Self::Address => "address",
        }
    }

    /// Whether a duplicate digest for this attribute must be rejected.
    pub fn is_unique(self) -> bool {
        matches!(self, Self::Domain | Self::Email)
    }
}

/// Validates one plaintext value against its attribute's rules.
pub fn validate_company_attribute(
    attribute: CompanyAttribute,
    value: &str,
) -> Result<(), FieldValidationError> {
    match attribute {
        CompanyAttribute::Domain => require_domain("domain", value, MAX_DOMAIN_CHARS),
        CompanyAttribute::Name => require_text("name", value, MAX_NAME_CHARS),
        CompanyAttribute::Email => require_email("email", value, MAX_EMAIL_CHARS),
        CompanyAttribute::Mobile => require_text("mobile", value, MAX_MOBILE_CHARS),
        CompanyAttribute::Address => require_text("address", value, MAX_ADDRESS_CHARS),
    }
}

/// Registration request for one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyDraft {
    pub domain: String,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub address: String,
}

impl CompanyDraft {
    /// Validates every field before crypto or storage work.
    pub fn validate(&self) -> Result<(), FieldValidationError> {
        for attribute in CompanyAttribute::ALL {
            validate_company_attribute(attribute, self.attribute_value(attribute))?;
        }
        Ok(())
    }

    /// Returns the plaintext value for one attribute tag.
    pub fn attribute_value(&self, attribute: CompanyAttribute) -> &str {
        match attribute {
            CompanyAttribute::Domain => &self.domain,
            CompanyAttribute::Name => &self.name,
            CompanyAttribute::Email => &self.email,
            CompanyAttribute::Mobile => &self.mobile,
            CompanyAttribute::Address => &self.address,
        }
    }
}

/// Update request for the non-unique contact attributes.
///
/// Email changes go through the dedicated email update path because of the
/// uniqueness check; the domain is immutable after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyContactUpdate {
    pub name: String,
    pub mobile: String,
    pub address: String,
}

impl CompanyContactUpdate {
    pub fn validate(&self) -> Result<(), FieldValidationError> {
        validate_company_attribute(CompanyAttribute::Name, &self.name)?;
        validate_company_attribute(CompanyAttribute::Mobile, &self.mobile)?;
        validate_company_attribute(CompanyAttribute::Address, &self.address)?;
        Ok(())
    }
}
