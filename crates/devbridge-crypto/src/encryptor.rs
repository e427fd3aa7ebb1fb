//! The two-operation encryption contract consumed by the storage layer.

use async_trait::async_trait;

use crate::error::CryptoError;

/// Encrypts values before they are written and decrypts them on read.
///
/// Implementations may suspend (for example when the key lives in a remote
/// vault), so both operations are async.
#[async_trait]
pub trait Encryptor: Send + Sync {
    async fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError>;

    async fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError>;
}
