//! Attribute cipher codec.
//!
//! # Responsibility
//! - Encrypt/decrypt single attribute values under one fixed key.
//! - Validate key material once, at construction time.
//!
//! # Invariants
//! - Encryption is deterministic: equal plaintext yields equal ciphertext.
//! - The key is immutable for the lifetime of the codec value.
//! - Key bytes never appear in errors, logs, or `Debug` output.

use aes_siv::aead::{Aead, KeyInit};
use aes_siv::Aes256SivAead;
use secrecy::{ExposeSecret, SecretVec};
use std::error::Error;
use std::fmt::{Display, Formatter};
use zeroize::Zeroizing;

/// Required key length in bytes for AES-256-SIV.
pub const KEY_LEN: usize = 64;

/// Errors from codec construction and attribute transforms.
#[derive(Debug, PartialEq, Eq)]
pub enum CryptoError {
    /// Supplied key has the wrong byte length.
    InvalidKeyLength { expected: usize, actual: usize },
    /// Supplied key is not valid lowercase/uppercase hex.
    InvalidKeyEncoding,
    /// Encryption backend rejected the operation.
    Encrypt,
    /// Ciphertext failed authentication or produced unusable plaintext.
    Decrypt(&'static str),
}

impl Display for CryptoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKeyLength { expected, actual } => {
                write!(f, "cipher key must be {expected} bytes, got {actual}")
            }
            Self::InvalidKeyEncoding => write!(f, "cipher key is not valid hex"),
            Self::Encrypt => write!(f, "attribute encryption failed"),
            Self::Decrypt(reason) => write!(f, "attribute decryption failed: {reason}"),
        }
    }
}

impl Error for CryptoError {}

/// Deterministic attribute cipher over one fixed AES-256-SIV key.
///
/// The codec is constructed once at process start and injected into the
/// services that need it; there is no global key state. Cloning re-wraps the
/// key and yields a codec with identical output.
pub struct FieldCipher {
    key: SecretVec<u8>,
}

impl FieldCipher {
    /// Creates a codec from raw key bytes.
    ///
    /// # Errors
    /// - `InvalidKeyLength` when the key is not exactly [`KEY_LEN`] bytes.
    pub fn new(key: SecretVec<u8>) -> Result<Self, CryptoError> {
        let actual = key.expose_secret().len();
        if actual != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_LEN,
                actual,
            });
        }
        Ok(Self { key })
    }

    /// Creates a codec from a hex-encoded key string.
    ///
    /// # Errors
    /// - `InvalidKeyEncoding` when the string is not valid hex.
    /// - `InvalidKeyLength` when the decoded key is not [`KEY_LEN`] bytes.
    pub fn from_hex(key_hex: &str) -> Result<Self, CryptoError> {
        let decoded =
            Zeroizing::new(hex::decode(key_hex.trim()).map_err(|_| CryptoError::InvalidKeyEncoding)?);
        Self::new(SecretVec::new(decoded.to_vec()))
    }

    /// Encrypts one attribute value.
    ///
    /// Deterministic: the same plaintext always produces the same ciphertext
    /// bytes under the same key.
    pub fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, CryptoError> {
        let cipher = self.build_cipher()?;
        // AES-SIV derives its synthetic IV from key + message; a fixed empty
        // nonce keeps the output deterministic.
        cipher
            .encrypt(&Default::default(), plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)
    }

    /// Decrypts one attribute value back to plaintext.
    ///
    /// # Errors
    /// - `Decrypt` when authentication fails or the plaintext is not UTF-8.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<String, CryptoError> {
        let cipher = self.build_cipher()?;
        let plain = Zeroizing::new(
            cipher
                .decrypt(&Default::default(), ciphertext)
                .map_err(|_| CryptoError::Decrypt("ciphertext failed authentication"))?,
        );
        let text = std::str::from_utf8(&plain)
            .map_err(|_| CryptoError::Decrypt("decrypted value is not valid utf-8"))?;
        Ok(text.to_string())
    }

    fn build_cipher(&self) -> Result<Aes256SivAead, CryptoError> {
        let key = self.key.expose_secret();
        Aes256SivAead::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.len(),
        })
    }
}

impl Clone for FieldCipher {
    fn clone(&self) -> Self {
        Self {
            key: SecretVec::new(self.key.expose_secret().to_vec()),
        }
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{CryptoError, FieldCipher, KEY_LEN};
    use secrecy::SecretVec;

    fn test_cipher() -> FieldCipher {
        FieldCipher::new(SecretVec::new(vec![0x42; KEY_LEN])).unwrap()
    }

    #[test]
    fn encrypt_is_deterministic() {
        let cipher = test_cipher();
        let first = cipher.encrypt("nhn.com").unwrap();
        let second = cipher.encrypt("nhn.com").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn roundtrip_preserves_plaintext() {
        let cipher = test_cipher();
        let ciphertext = cipher.encrypt("031-000-0000").unwrap();
        assert_ne!(ciphertext.as_slice(), "031-000-0000".as_bytes());
        assert_eq!(cipher.decrypt(&ciphertext).unwrap(), "031-000-0000");
    }

    #[test]
    fn distinct_plaintexts_yield_distinct_ciphertexts() {
        let cipher = test_cipher();
        let first = cipher.encrypt("a@example.com").unwrap();
        let second = cipher.encrypt("b@example.com").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn rejects_wrong_key_length() {
        let err = FieldCipher::new(SecretVec::new(vec![0x42; 32])).unwrap_err();
        assert_eq!(
            err,
            CryptoError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: 32
            }
        );
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let cipher = test_cipher();
        let mut ciphertext = cipher.encrypt("Pangyo").unwrap();
        ciphertext[0] ^= 0xff;
        assert!(matches!(
            cipher.decrypt(&ciphertext),
            Err(CryptoError::Decrypt(_))
        ));
    }

    #[test]
    fn different_keys_cannot_read_each_other() {
        let first = test_cipher();
        let second = FieldCipher::new(SecretVec::new(vec![0x43; KEY_LEN])).unwrap();
        let ciphertext = first.encrypt("NHN").unwrap();
        assert!(second.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn clone_produces_identical_output() {
        let cipher = test_cipher();
        let cloned = cipher.clone();
        assert_eq!(
            cipher.encrypt("nhn@nhn.com").unwrap(),
            cloned.encrypt("nhn@nhn.com").unwrap()
        );
    }

    #[test]
    fn from_hex_accepts_valid_key_and_rejects_garbage() {
        let key_hex = "ab".repeat(KEY_LEN);
        let cipher = FieldCipher::from_hex(&key_hex).unwrap();
        let ciphertext = cipher.encrypt("x").unwrap();
        assert_eq!(cipher.decrypt(&ciphertext).unwrap(), "x");

        assert_eq!(
            FieldCipher::from_hex("not-hex").unwrap_err(),
            CryptoError::InvalidKeyEncoding
        );
        assert!(matches!(
            FieldCipher::from_hex("abcd").unwrap_err(),
            CryptoError::InvalidKeyLength { .. }
        ));
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let cipher = test_cipher();
        let ciphertext = cipher.encrypt("").unwrap();
        assert_eq!(cipher.decrypt(&ciphertext).unwrap(), "");
    }
}
