//! Local AEAD cipher for callback URLs.
//!
//! Derives a symmetric key from a master secret via HKDF-SHA256 and seals each
//! value with ChaCha20-Poly1305 under a fresh random nonce.

use async_trait::async_trait;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::encryptor::Encryptor;
use crate::error::CryptoError;

/// HKDF info string for the at-rest key.
const HKDF_INFO: &[u8] = b"devbridge-callback-url-v1";

/// HKDF salt for domain separation (recommended by RFC 5869).
const HKDF_SALT: &[u8] = b"devbridge-at-rest-hkdf-salt-v1";

/// Nonce size for ChaCha20-Poly1305.
pub const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag size.
const TAG_SIZE: usize = 16;

/// Shortest master secret accepted.
pub const MIN_SECRET_LEN: usize = 16;

/// Encrypts callback URLs at rest.
///
/// Output is lowercase hex of `nonce || ciphertext || tag`, so it fits a
/// TEXT column unchanged.
pub struct CallbackCipher {
    cipher: ChaCha20Poly1305,
}

impl CallbackCipher {
    /// Build a cipher from raw master secret bytes.
    pub fn from_master_secret(secret: &[u8]) -> Result<Self, CryptoError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: MIN_SECRET_LEN,
                actual: secret.len(),
            });
        }

        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), secret);
        let mut key_bytes = [0u8; 32];
        hk.expand(HKDF_INFO, &mut key_bytes)
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
        key_bytes.zeroize();

        Ok(Self { cipher })
    }

    /// Build a cipher from a hex-encoded master secret (as found in env/config).
    pub fn from_hex_secret(secret_hex: &str) -> Result<Self, CryptoError> {
        let mut secret = hex::decode(secret_hex.trim())
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
        let cipher = Self::from_master_secret(&secret);
        secret.zeroize();
        cipher
    }

    /// Encrypt a value into its hex-encoded stored form.
    pub fn seal(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(hex::encode(sealed))
    }

    /// Decrypt a value produced by [`CallbackCipher::seal`].
    pub fn open(&self, sealed_hex: &str) -> Result<String, CryptoError> {
        let sealed =
            hex::decode(sealed_hex).map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::DecryptionFailed(format!(
                "sealed value too short: {} bytes",
                sealed.len()
            )));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }
}

#[async_trait]
impl Encryptor for CallbackCipher {
    async fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        self.seal(plaintext)
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        self.open(ciphertext)
    }
}
