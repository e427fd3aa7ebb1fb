//! Ports to the device-twin hubs.
//!
//! The bridge never talks to a hub itself. [`HubTwinClient`] locates devices
//! and reads/writes twins; [`TwinWatcher`] arms the upstream change
//! notifications that feed webhook deliveries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::SubscriptionType;

/// Errors reported by a hub.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The hub does not (yet) know the device. Newly created devices show up
    /// here until provisioning completes; callers are expected to retry.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Hub request failed: {0}")]
    Upstream(String),
}

/// Discovery plus twin reads and writes against a specific hub.
#[async_trait]
pub trait HubTwinClient: Send + Sync {
    /// Find the hub that currently owns `device_id`.
    async fn discover_hub(&self, device_id: &str) -> Result<String, HubError>;

    async fn get_twin(&self, hub: &str, device_id: &str) -> Result<Value, HubError>;

    async fn update_reported_properties(
        &self,
        hub: &str,
        device_id: &str,
        patch: &Map<String, Value>,
    ) -> Result<(), HubError>;
}

/// Runtime health of the upstream watch behind a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionHealth {
    Starting,
    Running,
    Stopped,
    /// No watcher is configured, so nothing is known.
    Unmonitored,
}

/// Arms and disarms upstream twin-change notifications.
#[async_trait]
pub trait TwinWatcher: Send + Sync {
    async fn arm(&self, device_id: &str, subscription_type: SubscriptionType) -> Result<(), HubError>;

    async fn disarm(&self, device_id: &str, subscription_type: SubscriptionType)
    -> Result<(), HubError>;

    /// The device has no subscriptions left; drop anything held for it.
    async fn release(&self, device_id: &str) -> Result<(), HubError>;

    async fn status(&self, device_id: &str, subscription_type: SubscriptionType) -> SubscriptionHealth;
}
