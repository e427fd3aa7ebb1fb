//! Webhook subscription lifecycle over the persistence gateway.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use url::Url;

use crate::hub::{HubError, SubscriptionHealth, TwinWatcher};
use crate::storage::{BridgeStore, DeviceSubscription, RowStream, StorageError, SubscriptionType};

/// Errors returned by [`SubscriptionRegistry`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Watcher error: {0}")]
    Hub(#[from] HubError),
}

/// A subscription together with the health of its upstream watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSubscriptionStatus {
    #[serde(flatten)]
    pub subscription: DeviceSubscription,
    pub status: SubscriptionHealth,
}

/// Create, read and delete webhook subscriptions.
///
/// The watcher is optional. Without one every status is
/// [`SubscriptionHealth::Unmonitored`] and no upstream calls are made.
pub struct SubscriptionRegistry {
    store: Arc<dyn BridgeStore>,
    watcher: Option<Arc<dyn TwinWatcher>>,
}

impl SubscriptionRegistry {
    pub fn new(store: Arc<dyn BridgeStore>) -> Self {
        Self {
            store,
            watcher: None,
        }
    }

    #[must_use]
    pub fn with_watcher(mut self, watcher: Arc<dyn TwinWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Current subscription for a key, or `None` if there is none.
    #[instrument(skip(self))]
    pub async fn get(
        &self,
        device_id: &str,
        subscription_type: SubscriptionType,
    ) -> Result<Option<DeviceSubscriptionStatus>, RegistryError> {
        let Some(subscription) = self
            .store
            .get_subscription(device_id, subscription_type)
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(self.with_status(subscription).await))
    }

    /// Create the subscription or replace its callback URL.
    ///
    /// Repeating the call is safe. The row is written before the watch is
    /// armed, so a failed arm can simply be retried.
    #[instrument(skip(self, callback_url))]
    pub async fn create_or_update(
        &self,
        device_id: &str,
        subscription_type: SubscriptionType,
        callback_url: &str,
    ) -> Result<DeviceSubscriptionStatus, RegistryError> {
        validate_device_id(device_id)?;
        validate_callback_url(callback_url)?;

        let subscription = self
            .store
            .upsert_subscription(device_id, subscription_type, callback_url)
            .await?;

        if let Some(watcher) = &self.watcher {
            watcher.arm(device_id, subscription_type).await?;
        }

        info!("Subscription saved");
        Ok(self.with_status(subscription).await)
    }

    /// Remove a subscription. Deleting an absent one succeeds.
    ///
    /// The device is released from the watcher once its last subscription
    /// is gone.
    #[instrument(skip(self))]
    pub async fn delete(
        &self,
        device_id: &str,
        subscription_type: SubscriptionType,
    ) -> Result<(), RegistryError> {
        self.store
            .delete_subscription(device_id, subscription_type)
            .await?;

        if let Some(watcher) = &self.watcher {
            watcher.disarm(device_id, subscription_type).await?;

            if !self.store.has_subscriptions(device_id).await? {
                watcher.release(device_id).await?;
            }
        }

        info!("Subscription deleted");
        Ok(())
    }

    /// Every subscription of one device, with status.
    #[instrument(skip(self))]
    pub async fn list_for_device(
        &self,
        device_id: &str,
    ) -> Result<Vec<DeviceSubscriptionStatus>, RegistryError> {
        let subscriptions = self.store.list_subscriptions_for_device(device_id).await?;

        let mut statuses = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            statuses.push(self.with_status(subscription).await);
        }
        Ok(statuses)
    }

    /// Stream every stored subscription, for reconciliation.
    pub fn list_all(&self, cancel: CancellationToken) -> RowStream<'_, DeviceSubscription> {
        self.store.list_all_subscriptions(cancel)
    }

    async fn with_status(&self, subscription: DeviceSubscription) -> DeviceSubscriptionStatus {
        let status = match &self.watcher {
            Some(watcher) => {
                watcher
                    .status(&subscription.device_id, subscription.subscription_type)
                    .await
            }
            None => SubscriptionHealth::Unmonitored,
        };
        DeviceSubscriptionStatus {
            subscription,
            status,
        }
    }
}

fn validate_device_id(device_id: &str) -> Result<(), RegistryError> {
    if device_id.trim().is_empty() {
        return Err(RegistryError::InvalidArgument(
            "device id must not be empty".into(),
        ));
    }
    Ok(())
}

/// Accept absolute `http`/`https` URLs with a host.
///
/// Whitespace is rejected outright rather than percent-encoded, so the stored
/// URL is exactly the one the caller sent.
fn validate_callback_url(callback_url: &str) -> Result<(), RegistryError> {
    let invalid = |reason: &str| {
        RegistryError::InvalidArgument(format!("invalid callback URL {callback_url:?}: {reason}"))
    };

    if callback_url.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace"));
    }

    let parsed = Url::parse(callback_url).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.host().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(())
}
