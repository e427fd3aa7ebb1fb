//! `DeviceBridge` Encryption-at-rest Library
//!
//! Callback URLs are stored encrypted; the persistence gateway only sees the
//! [`Encryptor`] port.
//!
//! ## Crypto primitives
//!
//! - **Key**: HKDF-SHA256 over an operator-supplied master secret
//! - **Encryption**: ChaCha20-Poly1305 AEAD, random 12-byte nonce per value
//! - **Encoding**: `hex(nonce || ciphertext || tag)`

pub mod cipher;
pub mod encryptor;
pub mod error;

pub use cipher::{CallbackCipher, MIN_SECRET_LEN, NONCE_SIZE};
pub use encryptor::Encryptor;
pub use error::CryptoError;
