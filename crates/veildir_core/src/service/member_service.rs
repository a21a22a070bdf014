//! Member registration, credential and listing service.
//!
//! # Responsibility
//! - Orchestrate member registration: validate, pre-check email uniqueness,
//!   resolve company and role references, encrypt, persist atomically.
//! - Serve email lookups, login credential reads and role-filtered company
//!   listings.
//! - Own email/password/role updates and the withdraw lifecycle.
//!
//! # Invariants
//! - Plaintext email values never reach the repository or the logs.
//! - Withdrawn members stay resolvable by email; credential reads and
//!   credential mutations reject them.
//! - Listing decrypts rows strictly after filtering and pagination.

use crate::crypto::cipher::{CryptoError, FieldCipher};
use crate::crypto::digest::digest_hex;
use crate::crypto::seal;
use crate::model::company::{CompanyAttribute, CompanyId};
use crate::model::member::{
    validate_member_attribute, validate_password_hash, MemberAttribute, MemberDraft, MemberId,
};
use crate::model::role::ROLE_USER;
use crate::model::validate::FieldValidationError;
use crate::repo::company_repo::CompanyRepository;
use crate::repo::member_repo::{
    normalize_member_limit, MemberListQuery, MemberRepository, MemberRow, NewMember, RoleFilter,
};
use crate::repo::role_repo::RoleRepository;
use crate::repo::RepoError;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for member use-cases.
#[derive(Debug)]
pub enum MemberServiceError {
    /// Malformed request input, rejected before crypto or storage work.
    Validation(FieldValidationError),
    /// Another member already registered this email.
    AlreadyRegistered { attribute: &'static str },
    /// No member matches the given key or email.
    MemberNotFound,
    /// The referenced company domain is not registered.
    CompanyNotFound,
    /// The referenced role id is not in the catalog.
    RoleNotFound(String),
    /// Supplied current value does not match the stored one.
    CurrentValueMismatch { attribute: &'static str },
    /// Supplied current credential hash does not match the stored one.
    PasswordMismatch,
    /// The member has withdrawn; credential operations are rejected.
    MemberWithdrawn,
    /// Cipher codec failure.
    Crypto(CryptoError),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for MemberServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::AlreadyRegistered { attribute } => {
                write!(f, "member `{attribute}` value is already registered")
            }
            Self::MemberNotFound => write!(f, "member not found"),
            Self::CompanyNotFound => write!(f, "referenced company not found"),
            Self::RoleNotFound(role_id) => write!(f, "referenced role not found: {role_id}"),
            Self::CurrentValueMismatch { attribute } => {
                write!(f, "current `{attribute}` value does not match stored value")
            }
            Self::PasswordMismatch => write!(f, "current password hash does not match"),
            Self::MemberWithdrawn => write!(f, "member has withdrawn"),
            Self::Crypto(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent member state: {details}")
            }
        }
    }
}

impl Error for MemberServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Crypto(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FieldValidationError> for MemberServiceError {
    fn from(value: FieldValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<CryptoError> for MemberServiceError {
    fn from(value: CryptoError) -> Self {
        Self::Crypto(value)
    }
}

impl From<RepoError> for MemberServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::DuplicateDigest { attribute } => Self::AlreadyRegistered { attribute },
            RepoError::StaleDigest { attribute } => Self::CurrentValueMismatch { attribute },
            RepoError::NotFound(_) => Self::MemberNotFound,
            other => Self::Repo(other),
        }
    }
}

/// Decrypted member view returned by lookups and listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub member_id: MemberId,
    pub email: String,
    pub company_id: CompanyId,
    pub company_domain: String,
    pub role_id: String,
    /// Epoch ms registration timestamp.
    pub registered_at: i64,
    /// Epoch ms of the last recorded login.
    pub last_login_at: Option<i64>,
    pub withdrawn: bool,
}

/// Credential projection for an upstream authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginCredentials {
    pub member_id: MemberId,
    pub email: String,
    /// Opaque upstream credential hash, compared by the caller.
    pub password_hash: String,
    pub role_id: String,
}

/// List result envelope used by service callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberListResult {
    /// Page items sorted by `registered_at ASC, member_id ASC`.
    pub items: Vec<MemberProfile>,
    /// Effective normalized limit used by the query.
    pub applied_limit: u32,
    /// Total member count under the same role predicate.
    pub total: u64,
}

/// Member service facade over repository implementations.
pub struct MemberService<M, C, R>
where
    M: MemberRepository,
    C: CompanyRepository,
    R: RoleRepository,
{
    members: M,
    companies: C,
    roles: R,
    cipher: FieldCipher,
    default_role_id: String,
}

impl<M, C, R> MemberService<M, C, R>
where
    M: MemberRepository,
    C: CompanyRepository,
    R: RoleRepository,
{
    /// Creates a service assigning `ROLE_USER` to new members.
    pub fn new(members: M, companies: C, roles: R, cipher: FieldCipher) -> Self {
        Self::with_default_role(members, companies, roles, cipher, ROLE_USER)
    }

    /// Creates a service assigning the given role to new members.
    pub fn with_default_role(
        members: M,
        companies: C,
        roles: R,
        cipher: FieldCipher,
        default_role_id: impl Into<String>,
    ) -> Self {
        Self {
            members,
            companies,
            roles,
            cipher,
            default_role_id: default_role_id.into(),
        }
    }

    /// Registers one member: validate, pre-check email uniqueness, resolve
    /// company and role references, encrypt, persist aggregate plus index
    /// row in one transaction.
    pub fn register(&self, draft: &MemberDraft) -> Result<MemberProfile, MemberServiceError> {
        draft.validate()?;

        let email_digest = digest_hex(&draft.email);
        if self
            .members
            .member_digest_exists(MemberAttribute::Email, &email_digest)?
        {
            return Err(MemberServiceError::AlreadyRegistered {
                attribute: MemberAttribute::Email.as_str(),
            });
        }

        let domain_digest = digest_hex(&draft.company_domain);
        let company_id = match self
            .companies
            .find_company_by_digest(CompanyAttribute::Domain, &domain_digest)?
        {
            Some(id) => id,
            None => return Err(MemberServiceError::CompanyNotFound),
        };

        if !self.roles.role_exists(&self.default_role_id)? {
            return Err(MemberServiceError::RoleNotFound(
                self.default_role_id.clone(),
            ));
        }

        let member = NewMember {
            company_id,
            role_id: self.default_role_id.clone(),
            email: seal(&self.cipher, &draft.email)?,
            password_hash: draft.password_hash.clone(),
        };

        let member_id = self.members.create_member(&member)?;
        info!(
            "event=member_register module=service status=ok member_id={member_id} company_id={company_id}"
        );
        self.read_back(member_id)
    }

    /// Finds one member by plaintext email. Withdrawn members resolve too,
    /// with their `withdrawn` flag set.
    pub fn find_by_email(&self, email: &str) -> Result<MemberProfile, MemberServiceError> {
        let row = self.resolve_by_email(email)?;
        self.assemble_profile(row)
    }

    /// Loads one member by surrogate key.
    pub fn get(&self, id: MemberId) -> Result<Option<MemberProfile>, MemberServiceError> {
        match self.members.get_member(id)? {
            Some(row) => Ok(Some(self.assemble_profile(row)?)),
            None => Ok(None),
        }
    }

    /// Reads the credential projection for one email, for an upstream
    /// authentication layer. Rejects withdrawn members.
    pub fn login_credentials(&self, email: &str) -> Result<LoginCredentials, MemberServiceError> {
        let row = self.resolve_by_email(email)?;
        if row.is_withdrawn() {
            return Err(MemberServiceError::MemberWithdrawn);
        }

        Ok(LoginCredentials {
            member_id: row.member_id,
            email: self.decrypt_field(&row.email_cipher, "email")?,
            password_hash: row.password_hash,
            role_id: row.role_id,
        })
    }

    /// Stamps the last-login timestamp after a successful authentication.
    pub fn record_login(&self, id: MemberId) -> Result<(), MemberServiceError> {
        let row = match self.members.get_member(id)? {
            Some(row) => row,
            None => return Err(MemberServiceError::MemberNotFound),
        };
        if row.is_withdrawn() {
            return Err(MemberServiceError::MemberWithdrawn);
        }

        self.members.touch_member_login(id)?;
        Ok(())
    }

    /// Lists one company's members, filtered by role, paginated, decrypted
    /// after pagination. The total comes from a separate count query.
    pub fn list_for_company(
        &self,
        company_domain: &str,
        role_filter: RoleFilter,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<MemberListResult, MemberServiceError> {
        let domain_digest = digest_hex(company_domain);
        let company_id = match self
            .companies
            .find_company_by_digest(CompanyAttribute::Domain, &domain_digest)?
        {
            Some(id) => id,
            None => return Err(MemberServiceError::CompanyNotFound),
        };

        let applied_limit = normalize_member_limit(limit);
        let query = MemberListQuery {
            role_filter: role_filter.clone(),
            limit: Some(applied_limit),
            offset,
        };
        let rows = self.members.list_company_members(company_id, &query)?;
        let total = self.members.count_company_members(company_id, &role_filter)?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(self.profile_from_row(row, company_domain.to_string())?);
        }

        Ok(MemberListResult {
            items,
            applied_limit,
            total,
        })
    }

    /// Replaces the login email after verifying the caller knows the
    /// current one. Ciphertext and index entry change in one transaction.
    pub fn update_email(
        &self,
        id: MemberId,
        current_email: &str,
        new_email: &str,
    ) -> Result<MemberProfile, MemberServiceError> {
        validate_member_attribute(MemberAttribute::Email, new_email)?;

        let row = match self.members.get_member(id)? {
            Some(row) => row,
            None => return Err(MemberServiceError::MemberNotFound),
        };
        if row.is_withdrawn() {
            return Err(MemberServiceError::MemberWithdrawn);
        }

        let old_digest = digest_hex(current_email);
        match self
            .members
            .find_member_by_digest(MemberAttribute::Email, &old_digest)?
        {
            Some(found) if found == id => {}
            _ => {
                return Err(MemberServiceError::CurrentValueMismatch {
                    attribute: MemberAttribute::Email.as_str(),
                });
            }
        }

        let new_digest = digest_hex(new_email);
        if let Some(owner) = self
            .members
            .find_member_by_digest(MemberAttribute::Email, &new_digest)?
        {
            if owner == id {
                // Unchanged value; nothing to swap.
                return self.read_back(id);
            }
            return Err(MemberServiceError::AlreadyRegistered {
                attribute: MemberAttribute::Email.as_str(),
            });
        }

        let sealed = seal(&self.cipher, new_email)?;
        self.members.swap_member_email(id, &old_digest, &sealed)?;
        self.read_back(id)
    }

    /// Replaces the credential hash after verifying the current one.
    pub fn change_password(
        &self,
        id: MemberId,
        current_hash: &str,
        new_hash: &str,
    ) -> Result<(), MemberServiceError> {
        validate_password_hash(new_hash)?;

        let row = match self.members.get_member(id)? {
            Some(row) => row,
            None => return Err(MemberServiceError::MemberNotFound),
        };
        if row.is_withdrawn() {
            return Err(MemberServiceError::MemberWithdrawn);
        }
        if row.password_hash != current_hash {
            return Err(MemberServiceError::PasswordMismatch);
        }

        self.members.set_member_password_hash(id, new_hash)?;
        Ok(())
    }

    /// Moves the member to another catalog role.
    pub fn change_role(
        &self,
        id: MemberId,
        role_id: &str,
    ) -> Result<MemberProfile, MemberServiceError> {
        if !self.roles.role_exists(role_id)? {
            return Err(MemberServiceError::RoleNotFound(role_id.to_string()));
        }

        self.members.set_member_role(id, role_id)?;
        self.read_back(id)
    }

    /// Withdraws the member: status flag only, row and index entry stay.
    pub fn withdraw(&self, id: MemberId) -> Result<MemberProfile, MemberServiceError> {
        self.members.withdraw_member(id)?;
        info!("event=member_withdraw module=service status=ok member_id={id}");
        self.read_back(id)
    }

    /// Removes the member and its index row. Rare path; withdraw is the
    /// default lifecycle.
    pub fn hard_delete(&self, id: MemberId) -> Result<(), MemberServiceError> {
        self.members.hard_delete_member(id)?;
        info!("event=member_hard_delete module=service status=ok member_id={id}");
        Ok(())
    }

    fn resolve_by_email(&self, email: &str) -> Result<MemberRow, MemberServiceError> {
        let digest = digest_hex(email);
        let member_id = match self
            .members
            .find_member_by_digest(MemberAttribute::Email, &digest)?
        {
            Some(id) => id,
            None => return Err(MemberServiceError::MemberNotFound),
        };

        match self.members.get_member(member_id)? {
            Some(row) => Ok(row),
            None => {
                error!(
                    "event=member_lookup module=service status=error error_code=index_dangling attribute=email member_id={member_id}"
                );
                Err(MemberServiceError::MemberNotFound)
            }
        }
    }

    fn read_back(&self, id: MemberId) -> Result<MemberProfile, MemberServiceError> {
        match self.members.get_member(id)? {
            Some(row) => self.assemble_profile(row),
            None => Err(MemberServiceError::InconsistentState(
                "member missing in read-back",
            )),
        }
    }

    fn assemble_profile(&self, row: MemberRow) -> Result<MemberProfile, MemberServiceError> {
        let company = match self.companies.get_company(row.company_id)? {
            Some(company) => company,
            None => {
                error!(
                    "event=member_lookup module=service status=error error_code=company_ref_missing member_id={} company_id={}",
                    row.member_id, row.company_id
                );
                return Err(MemberServiceError::InconsistentState(
                    "member company reference missing",
                ));
            }
        };

        let company_domain = self.decrypt_field(&company.domain_cipher, "domain")?;
        self.profile_from_row(row, company_domain)
    }

    fn profile_from_row(
        &self,
        row: MemberRow,
        company_domain: String,
    ) -> Result<MemberProfile, MemberServiceError> {
        let withdrawn = row.is_withdrawn();
        Ok(MemberProfile {
            member_id: row.member_id,
            email: self.decrypt_field(&row.email_cipher, "email")?,
            company_id: row.company_id,
            company_domain,
            role_id: row.role_id,
            registered_at: row.registered_at,
            last_login_at: row.last_login_at,
            withdrawn,
        })
    }

    fn decrypt_field(
        &self,
        ciphertext: &[u8],
        attribute: &'static str,
    ) -> Result<String, MemberServiceError> {
        self.cipher.decrypt(ciphertext).map_err(|err| {
            error!(
                "event=member_decrypt module=service status=error error_code=crypto_failure attribute={attribute} error={err}"
            );
            MemberServiceError::Crypto(err)
        })
    }
}
