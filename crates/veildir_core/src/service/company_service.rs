//! Company registration and lookup service.
//!
//! # Responsibility
//! - Orchestrate validate, digest pre-check, encrypt and persist for company
//!   registration.
//! - Serve digest-based lookups and decrypt-after-pagination listings.
//! - Own attribute updates, status flips and hard deletion.
//!
//! # Invariants
//! - Plaintext attribute values never reach the repository or the logs.
//! - Uniqueness rejections surface as `AlreadyRegistered` whether they come
//!   from the pre-check or from the storage constraint.
//! - A dangling index pointer is logged as an integrity fault and surfaced
//!   to the caller as a plain `CompanyNotFound`.

use crate::crypto::cipher::{CryptoError, FieldCipher};
use crate::crypto::digest::digest_hex;
use crate::crypto::seal;
use crate::model::company::{
    validate_company_attribute, CompanyAttribute, CompanyContactUpdate, CompanyDraft, CompanyId,
};
use crate::model::validate::FieldValidationError;
use crate::repo::company_repo::{
    normalize_company_limit, AttributeSwap, CompanyListQuery, CompanyRepository, CompanyRow,
    SealedCompany,
};
use crate::repo::RepoError;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for company use-cases.
#[derive(Debug)]
pub enum CompanyServiceError {
    /// Malformed request input, rejected before crypto or storage work.
    Validation(FieldValidationError),
    /// Another company already registered this unique attribute value.
    AlreadyRegistered { attribute: &'static str },
    /// No company matches the given key or attribute value.
    CompanyNotFound,
    /// Supplied current value does not match the stored one.
    CurrentValueMismatch { attribute: &'static str },
    /// Cipher codec failure.
    Crypto(CryptoError),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for CompanyServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::AlreadyRegistered { attribute } => {
                write!(f, "company `{attribute}` value is already registered")
            }
            Self::CompanyNotFound => write!(f, "company not found"),
            Self::CurrentValueMismatch { attribute } => {
                write!(f, "current `{attribute}` value does not match stored value")
            }
            Self::Crypto(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent company state: {details}")
            }
        }
    }
}

impl Error for CompanyServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Crypto(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FieldValidationError> for CompanyServiceError {
    fn from(value: FieldValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<CryptoError> for CompanyServiceError {
    fn from(value: CryptoError) -> Self {
        Self::Crypto(value)
    }
}

impl From<RepoError> for CompanyServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::DuplicateDigest { attribute } => Self::AlreadyRegistered { attribute },
            RepoError::StaleDigest { attribute } => Self::CurrentValueMismatch { attribute },
            RepoError::NotFound(_) => Self::CompanyNotFound,
            other => Self::Repo(other),
        }
    }
}

/// Decrypted company view returned by lookups and listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub company_id: CompanyId,
    pub domain: String,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub address: String,
    pub active: bool,
    /// Epoch ms registration timestamp.
    pub registered_at: i64,
}

/// List result envelope used by service callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyListResult {
    /// Page items sorted by `registered_at DESC, company_id ASC`.
    pub items: Vec<CompanyProfile>,
    /// Effective normalized limit used by the query.
    pub applied_limit: u32,
    /// Total company count, independent of pagination.
    pub total: u64,
}

/// Company service facade over repository implementations.
pub struct CompanyService<R: CompanyRepository> {
    repo: R,
    cipher: FieldCipher,
}

impl<R: CompanyRepository> CompanyService<R> {
    /// Creates a service over the given repository and cipher codec.
    pub fn new(repo: R, cipher: FieldCipher) -> Self {
        Self { repo, cipher }
    }

    /// Registers one company: validate, pre-check uniqueness, encrypt,
    /// persist aggregate plus index rows in one transaction.
    pub fn register(&self, draft: &CompanyDraft) -> Result<CompanyProfile, CompanyServiceError> {
        draft.validate()?;

        for attribute in CompanyAttribute::ALL {
            if !attribute.is_unique() {
                continue;
            }
            let digest = digest_hex(draft.attribute_value(attribute));
            if self.repo.company_digest_exists(attribute, &digest)? {
                return Err(CompanyServiceError::AlreadyRegistered {
                    attribute: attribute.as_str(),
                });
            }
        }

        let sealed = SealedCompany {
            domain: seal(&self.cipher, &draft.domain)?,
            name: seal(&self.cipher, &draft.name)?,
            email: seal(&self.cipher, &draft.email)?,
            mobile: seal(&self.cipher, &draft.mobile)?,
            address: seal(&self.cipher, &draft.address)?,
        };

        let company_id = self.repo.create_company(&sealed)?;
        info!("event=company_register module=service status=ok company_id={company_id}");
        self.read_back(company_id)
    }

    /// Finds one company by the plaintext value of any searchable attribute.
    pub fn find_by_attribute(
        &self,
        attribute: CompanyAttribute,
        value: &str,
    ) -> Result<CompanyProfile, CompanyServiceError> {
        let digest = digest_hex(value);
        let company_id = match self.repo.find_company_by_digest(attribute, &digest)? {
            Some(id) => id,
            None => return Err(CompanyServiceError::CompanyNotFound),
        };

        match self.repo.get_company(company_id)? {
            Some(row) => self.decrypt_profile(row),
            None => {
                error!(
                    "event=company_lookup module=service status=error error_code=index_dangling attribute={} company_id={company_id}",
                    attribute.as_str()
                );
                Err(CompanyServiceError::CompanyNotFound)
            }
        }
    }

    /// Finds one company by its registered domain.
    pub fn find_by_domain(&self, domain: &str) -> Result<CompanyProfile, CompanyServiceError> {
        self.find_by_attribute(CompanyAttribute::Domain, domain)
    }

    /// Finds one company by its registered contact email.
    pub fn find_by_email(&self, email: &str) -> Result<CompanyProfile, CompanyServiceError> {
        self.find_by_attribute(CompanyAttribute::Email, email)
    }

    /// Loads one company by surrogate key.
    pub fn get(&self, id: CompanyId) -> Result<Option<CompanyProfile>, CompanyServiceError> {
        match self.repo.get_company(id)? {
            Some(row) => Ok(Some(self.decrypt_profile(row)?)),
            None => Ok(None),
        }
    }

    /// Replaces the contact email after verifying the caller knows the
    /// current one. Ciphertext and index entry change in one transaction.
    pub fn update_email(
        &self,
        id: CompanyId,
        current_email: &str,
        new_email: &str,
    ) -> Result<CompanyProfile, CompanyServiceError> {
        validate_company_attribute(CompanyAttribute::Email, new_email)?;

        let old_digest = digest_hex(current_email);
        match self
            .repo
            .find_company_by_digest(CompanyAttribute::Email, &old_digest)?
        {
            Some(found) if found == id => {}
            _ => {
                return Err(CompanyServiceError::CurrentValueMismatch {
                    attribute: CompanyAttribute::Email.as_str(),
                });
            }
        }

        let new_digest = digest_hex(new_email);
        if let Some(owner) = self
            .repo
            .find_company_by_digest(CompanyAttribute::Email, &new_digest)?
        {
            if owner == id {
                // Unchanged value; nothing to swap.
                return self.read_back(id);
            }
            return Err(CompanyServiceError::AlreadyRegistered {
                attribute: CompanyAttribute::Email.as_str(),
            });
        }

        let swap = AttributeSwap {
            attribute: CompanyAttribute::Email,
            old_digest,
            sealed: seal(&self.cipher, new_email)?,
        };
        self.repo.swap_company_attributes(id, &[swap])?;
        self.read_back(id)
    }

    /// Replaces the non-unique contact attributes that actually changed.
    /// Each change swaps ciphertext and index digest together.
    pub fn update_contact(
        &self,
        id: CompanyId,
        update: &CompanyContactUpdate,
    ) -> Result<CompanyProfile, CompanyServiceError> {
        update.validate()?;

        let row = match self.repo.get_company(id)? {
            Some(row) => row,
            None => return Err(CompanyServiceError::CompanyNotFound),
        };

        let fields = [
            (CompanyAttribute::Name, &row.name_cipher, update.name.as_str()),
            (
                CompanyAttribute::Mobile,
                &row.mobile_cipher,
                update.mobile.as_str(),
            ),
            (
                CompanyAttribute::Address,
                &row.address_cipher,
                update.address.as_str(),
            ),
        ];

        let mut swaps = Vec::new();
        for (attribute, ciphertext, new_value) in fields {
            let current = self.decrypt_field(ciphertext, attribute)?;
            if current == new_value {
                continue;
            }
            swaps.push(AttributeSwap {
                attribute,
                old_digest: digest_hex(&current),
                sealed: seal(&self.cipher, new_value)?,
            });
        }

        if swaps.is_empty() {
            return self.decrypt_profile(row);
        }

        self.repo.swap_company_attributes(id, &swaps)?;
        self.read_back(id)
    }

    /// Re-enables a deactivated company. Index rows are untouched.
    pub fn activate(&self, id: CompanyId) -> Result<CompanyProfile, CompanyServiceError> {
        self.repo.set_company_active(id, true)?;
        self.read_back(id)
    }

    /// Deactivates a company. The row stays searchable.
    pub fn deactivate(&self, id: CompanyId) -> Result<CompanyProfile, CompanyServiceError> {
        self.repo.set_company_active(id, false)?;
        self.read_back(id)
    }

    /// Removes the company and all its index rows. Rare path; soft
    /// deactivation is the default lifecycle.
    pub fn hard_delete(&self, id: CompanyId) -> Result<(), CompanyServiceError> {
        self.repo.hard_delete_company(id)?;
        info!("event=company_hard_delete module=service status=ok company_id={id}");
        Ok(())
    }

    /// Lists companies with pagination. Rows are decrypted strictly after
    /// pagination; the total comes from a separate count query.
    pub fn list(
        &self,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<CompanyListResult, CompanyServiceError> {
        let applied_limit = normalize_company_limit(limit);
        let query = CompanyListQuery {
            limit: Some(applied_limit),
            offset,
        };
        let rows = self.repo.list_companies(&query)?;
        let total = self.repo.count_companies()?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(self.decrypt_profile(row)?);
        }

        Ok(CompanyListResult {
            items,
            applied_limit,
            total,
        })
    }

    fn read_back(&self, id: CompanyId) -> Result<CompanyProfile, CompanyServiceError> {
        match self.repo.get_company(id)? {
            Some(row) => self.decrypt_profile(row),
            None => Err(CompanyServiceError::InconsistentState(
                "company missing in read-back",
            )),
        }
    }

    fn decrypt_profile(&self, row: CompanyRow) -> Result<CompanyProfile, CompanyServiceError> {
        Ok(CompanyProfile {
            company_id: row.company_id,
            domain: self.decrypt_field(&row.domain_cipher, CompanyAttribute::Domain)?,
            name: self.decrypt_field(&row.name_cipher, CompanyAttribute::Name)?,
            email: self.decrypt_field(&row.email_cipher, CompanyAttribute::Email)?,
            mobile: self.decrypt_field(&row.mobile_cipher, CompanyAttribute::Mobile)?,
            address: self.decrypt_field(&row.address_cipher, CompanyAttribute::Address)?,
            active: row.is_active,
            registered_at: row.registered_at,
        })
    }

    fn decrypt_field(
        &self,
        ciphertext: &[u8],
        attribute: CompanyAttribute,
    ) -> Result<String, CompanyServiceError> {
        self.cipher.decrypt(ciphertext).map_err(|err| {
            error!(
                "event=company_decrypt module=service status=error error_code=crypto_failure attribute={} error={err}",
                attribute.as_str()
            );
            CompanyServiceError::Crypto(err)
        })
    }
}
