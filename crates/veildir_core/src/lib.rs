//! Core domain logic for the encrypted member/company directory.
//! This crate is the single source of truth for business invariants.

pub mod crypto;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use crypto::cipher::{CryptoError, FieldCipher, KEY_LEN};
pub use crypto::digest::{digest_hex, DIGEST_HEX_LEN};
pub use crypto::{seal, SealedValue};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::company::{
    CompanyAttribute, CompanyContactUpdate, CompanyDraft, CompanyId,
};
pub use model::member::{MemberAttribute, MemberDraft, MemberId};
pub use model::role::{Role, ROLE_OWNER, ROLE_PENDING, ROLE_USER};
pub use model::validate::FieldValidationError;
pub use repo::company_repo::{
    CompanyListQuery, CompanyRepository, CompanyRow, SqliteCompanyRepository,
};
pub use repo::member_repo::{
    MemberListQuery, MemberRepository, MemberRow, RoleFilter, SqliteMemberRepository,
};
pub use repo::role_repo::{RoleRepository, SqliteRoleRepository};
pub use repo::{RepoError, RepoResult};
pub use service::company_service::{
    CompanyListResult, CompanyProfile, CompanyService, CompanyServiceError,
};
pub use service::member_service::{
    LoginCredentials, MemberListResult, MemberProfile, MemberService, MemberServiceError,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
