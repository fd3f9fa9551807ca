pub mod encryption;
pub mod keys;

pub use encryption::*;
pub use keys::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: wrong key or corrupted data")]
    DecryptionFailed,

    #[error("Malformed ciphertext token")]
    MalformedToken,

    #[error("Decrypted field is not valid UTF-8")]
    InvalidUtf8,
}
