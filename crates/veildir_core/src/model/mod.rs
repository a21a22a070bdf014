//! Domain model for encrypted company/member aggregates.
//!
//! # Responsibility
//! - Define draft shapes, attribute tags, and reference data used by the
//!   registration and lookup paths.
//! - Validate request input before any crypto or storage work.
//!
//! # Invariants
//! - Every aggregate is identified by a stable surrogate UUID.
//! - Sensitive attributes exist here only as plaintext drafts; persistence
//!   shapes carry ciphertext and live in the repository layer.

pub mod company;
pub mod member;
pub mod role;
pub mod validate;
