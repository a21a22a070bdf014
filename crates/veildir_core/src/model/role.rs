//! Role reference data.
//!
//! # Responsibility
//! - Define the plain (unencrypted) role shape and the canonical role ids.
//!
//! # Invariants
//! - Roles are reference data: seeded by migration, read-only for this
//!   crate. Role management itself lives outside the subsystem.

use serde::{Deserialize, Serialize};

/// Role granted to the registering owner of a company.
pub const ROLE_OWNER: &str = "ROLE_OWNER";
/// Default role for approved members.
pub const ROLE_USER: &str = "ROLE_USER";
/// Role for members awaiting approval.
pub const ROLE_PENDING: &str = "ROLE_PENDING";

/// One role reference row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Stable role key, e.g. `ROLE_USER`.
    pub role_id: String,
    /// Human-readable name.
    pub role_name: String,
    /// Optional longer description.
    pub role_description: Option<String>,
}
