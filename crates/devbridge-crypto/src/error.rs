//! Callback cipher errors.

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Bad hex, truncated input, failed authentication or non-UTF-8 plaintext.
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Master secret too short: need {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Master secret is not valid hex: {0}")]
    InvalidKeyEncoding(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
}
