//! Blind-index digest.
//!
//! # Responsibility
//! - Map one plaintext attribute value to its fixed-length lookup digest.
//!
//! # Invariants
//! - Deterministic and one-way; identical input yields identical output.
//! - Unkeyed: the digest is a search key, not a confidentiality mechanism.
//! - Output is always [`DIGEST_HEX_LEN`] lowercase hex characters.

use sha2::{Digest, Sha256};

/// Length of every digest value in hex characters (SHA-256).
pub const DIGEST_HEX_LEN: usize = 64;

/// Computes the blind-index digest for one plaintext attribute value.
///
/// The same function runs at write time (building index rows) and at read
/// time (turning caller-supplied plaintext into a lookup key). Input is
/// hashed as-is; callers normalize/validate before hashing.
pub fn digest_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}
