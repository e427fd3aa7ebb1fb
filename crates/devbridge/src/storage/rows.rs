//! Raw table rows and their decoding into domain types.
//!
//! Columns are named explicitly in every query, so a schema change fails here
//! rather than at each call site.

use devbridge_crypto::Encryptor;

use super::models::{DeviceSubscription, HubCacheEntry, SubscriptionType};
use devbridge_core::db::StorageError;

#[derive(Debug, sqlx::FromRow)]
pub(super) struct SubscriptionRow {
    pub device_id: String,
    pub subscription_type: String,
    /// Ciphertext.
    pub callback_url: String,
    pub created_at: i64,
}

impl SubscriptionRow {
    /// Decode into a [`DeviceSubscription`], decrypting the callback URL.
    ///
    /// A decryption failure is fatal: ciphertext is never handed back.
    pub(super) async fn decode(
        self,
        encryptor: &dyn Encryptor,
    ) -> Result<DeviceSubscription, StorageError> {
        let subscription_type = self
            .subscription_type
            .parse::<SubscriptionType>()
            .map_err(|e| {
                StorageError::Decode(format!("device {}: {e}", self.device_id))
            })?;

        let callback_url = encryptor
            .decrypt(&self.callback_url)
            .await
            .map_err(|e| {
                StorageError::Encryption(format!(
                    "callback URL of {}/{subscription_type}: {e}",
                    self.device_id
                ))
            })?;

        Ok(DeviceSubscription {
            device_id: self.device_id,
            subscription_type,
            callback_url,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct HubCacheRow {
    pub device_id: String,
    pub hub: String,
    pub renewed_at: i64,
}

impl HubCacheRow {
    pub(super) fn decode(self) -> HubCacheEntry {
        HubCacheEntry {
            device_id: self.device_id,
            hub: self.hub,
            renewed_at: self.renewed_at,
        }
    }
}
