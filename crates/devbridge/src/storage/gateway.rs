//! The gateway contract the cache and registry layers are written against.

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use super::db::BridgeDatabase;
use super::models::{DeviceSubscription, HubCacheEntry, SubscriptionType};
use devbridge_core::db::StorageError;

/// Lazy, finite, non-restartable sequence of decoded rows.
pub type RowStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T, StorageError>> + Send + 'a>>;

/// Every read and write the bridge performs against its relational store.
///
/// Absence is never an error: single-row reads return `Option`, deletes of
/// missing rows succeed. Every other failure propagates unchanged.
#[async_trait]
pub trait BridgeStore: Send + Sync {
    /// All subscriptions ordered by device id, then subscription type.
    fn list_all_subscriptions(&self, cancel: CancellationToken) -> RowStream<'_, DeviceSubscription>;

    async fn list_subscriptions_for_device(
        &self,
        device_id: &str,
    ) -> Result<Vec<DeviceSubscription>, StorageError>;

    /// Whether the device has any subscription left. Never decrypts.
    async fn has_subscriptions(&self, device_id: &str) -> Result<bool, StorageError>;

    async fn get_subscription(
        &self,
        device_id: &str,
        subscription_type: SubscriptionType,
    ) -> Result<Option<DeviceSubscription>, StorageError>;

    /// Insert or replace the callback URL for a key. `created_at` of an
    /// existing row is preserved.
    async fn upsert_subscription(
        &self,
        device_id: &str,
        subscription_type: SubscriptionType,
        callback_url: &str,
    ) -> Result<DeviceSubscription, StorageError>;

    async fn delete_subscription(
        &self,
        device_id: &str,
        subscription_type: SubscriptionType,
    ) -> Result<(), StorageError>;

    /// All hub cache entries ordered by device id.
    fn list_hub_cache_entries(&self, cancel: CancellationToken) -> RowStream<'_, HubCacheEntry>;

    async fn upsert_hub_cache_entry(&self, device_id: &str, hub: &str) -> Result<(), StorageError>;

    /// Set `renewed_at` to now for every listed device that has an entry.
    async fn renew_hub_cache_entries(
        &self,
        device_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), StorageError>;

    /// Delete entries that are both orphaned and past the retention window.
    /// Returns the number of rows removed.
    async fn garbage_collect_hub_cache(&self) -> Result<u64, StorageError>;

    /// Run a maintenance statement. Not for modeled reads or writes.
    async fn execute(&self, statement: &str) -> Result<u64, StorageError>;
}

#[async_trait]
impl BridgeStore for BridgeDatabase {
    fn list_all_subscriptions(&self, cancel: CancellationToken) -> RowStream<'_, DeviceSubscription> {
        Self::list_all_subscriptions(self, cancel)
    }

    async fn list_subscriptions_for_device(
        &self,
        device_id: &str,
    ) -> Result<Vec<DeviceSubscription>, StorageError> {
        Self::list_subscriptions_for_device(self, device_id).await
    }

    async fn has_subscriptions(&self, device_id: &str) -> Result<bool, StorageError> {
        Self::has_subscriptions(self, device_id).await
    }

    async fn get_subscription(
        &self,
        device_id: &str,
        subscription_type: SubscriptionType,
    ) -> Result<Option<DeviceSubscription>, StorageError> {
        Self::get_subscription(self, device_id, subscription_type).await
    }

    async fn upsert_subscription(
        &self,
        device_id: &str,
        subscription_type: SubscriptionType,
        callback_url: &str,
    ) -> Result<DeviceSubscription, StorageError> {
        Self::upsert_subscription(self, device_id, subscription_type, callback_url).await
    }

    async fn delete_subscription(
        &self,
        device_id: &str,
        subscription_type: SubscriptionType,
    ) -> Result<(), StorageError> {
        Self::delete_subscription(self, device_id, subscription_type).await
    }

    fn list_hub_cache_entries(&self, cancel: CancellationToken) -> RowStream<'_, HubCacheEntry> {
        Self::list_hub_cache_entries(self, cancel)
    }

    async fn upsert_hub_cache_entry(&self, device_id: &str, hub: &str) -> Result<(), StorageError> {
        Self::upsert_hub_cache_entry(self, device_id, hub).await
    }

    async fn renew_hub_cache_entries(
        &self,
        device_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), StorageError> {
        Self::renew_hub_cache_entries(self, device_ids, cancel).await
    }

    async fn garbage_collect_hub_cache(&self) -> Result<u64, StorageError> {
        Self::garbage_collect_hub_cache(self).await
    }

    async fn execute(&self, statement: &str) -> Result<u64, StorageError> {
        Self::execute(self, statement).await
    }
}
