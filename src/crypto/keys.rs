use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroize;

use super::encryption::EncryptedData;
use super::CryptoError;

pub const PBKDF2_ITERATIONS: u32 = 600_000;
pub const KEY_LENGTH: usize = 32; // AES-256

/// Fixed salt for passphrase-derived keys.
const PASSPHRASE_SALT: &[u8] = b"er-clinical-suite/field-encryption/v1";

/// How the active key was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// `ENCRYPTION_KEY` held base64 of 32 raw bytes.
    Raw,
    /// `ENCRYPTION_KEY` was a passphrase stretched with PBKDF2.
    Passphrase,
    /// No key configured; random for this process only.
    Ephemeral,
}

/// Field encryption key, zeroed on drop
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct FieldKey {
    key_bytes: [u8; KEY_LENGTH],
}

impl FieldKey {
    /// Interpret an `ENCRYPTION_KEY` value: base64 (standard or URL-safe)
    /// of exactly 32 bytes is used as-is, anything else is a passphrase.
    pub fn from_config(raw: &str) -> (Self, KeySource) {
        let trimmed = raw.trim();
        if let Some(bytes) = decode_raw_key(trimmed) {
            return (Self { key_bytes: bytes }, KeySource::Raw);
        }
        (Self::derive(trimmed, PASSPHRASE_SALT), KeySource::Passphrase)
    }

    /// Resolve the configured key, or generate an ephemeral one.
    pub fn from_optional(raw: Option<&str>) -> (Self, KeySource) {
        match raw {
            Some(value) => Self::from_config(value),
            None => (Self::generate(), KeySource::Ephemeral),
        }
    }

    /// Derive from passphrase + salt using PBKDF2-SHA256
    pub fn derive(passphrase: &str, salt: &[u8]) -> Self {
        let mut key_bytes = [0u8; KEY_LENGTH];
        pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key_bytes);
        Self { key_bytes }
    }

    /// Cryptographically random key
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key_bytes = [0u8; KEY_LENGTH];
        rand::thread_rng().fill_bytes(&mut key_bytes);
        Self { key_bytes }
    }

    #[cfg(test)]
    pub(crate) fn from_bytes(key_bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key_bytes }
    }

    /// Encrypt data using AES-256-GCM
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedData, CryptoError> {
        EncryptedData::encrypt(&self.key_bytes, plaintext)
    }

    /// Decrypt data using AES-256-GCM
    pub fn decrypt(&self, encrypted: &EncryptedData) -> Result<Vec<u8>, CryptoError> {
        encrypted.decrypt(&self.key_bytes)
    }
}

fn decode_raw_key(value: &str) -> Option<[u8; KEY_LENGTH]> {
    use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};

    [STANDARD.decode(value), URL_SAFE.decode(value), URL_SAFE_NO_PAD.decode(value)]
        .into_iter()
        .flatten()
        .find(|bytes| bytes.len() == KEY_LENGTH)
        .and_then(|bytes| bytes.try_into().ok())
}
