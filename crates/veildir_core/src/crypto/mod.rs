//! Cryptographic primitives for encrypted attributes.
//!
//! # Responsibility
//! - Provide the attribute cipher codec and the blind-index digest.
//! - Couple ciphertext and digest production for write paths.
//!
//! # Invariants
//! - Both transforms are deterministic; the digest is derived from plaintext,
//!   never from ciphertext.
//! - Key material stays inside [`cipher::FieldCipher`]; nothing in this
//!   module logs or exposes it.

pub mod cipher;
pub mod digest;

use cipher::{CryptoError, FieldCipher};
use digest::digest_hex;

/// Ciphertext plus lookup digest for one plaintext attribute value.
///
/// Every encrypted column write carries exactly one of these, so the
/// aggregate row and its index row can never disagree about the plaintext
/// they were derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedValue {
    /// Encrypted attribute bytes, stored as-is in the aggregate column.
    pub ciphertext: Vec<u8>,
    /// Lowercase hex digest, stored in the blind index.
    pub digest: String,
}

/// Seals one plaintext attribute value for persistence.
pub fn seal(cipher: &FieldCipher, plaintext: &str) -> Result<SealedValue, CryptoError> {
    Ok(SealedValue {
        ciphertext: cipher.encrypt(plaintext)?,
        digest: digest_hex(plaintext),
    })
}
