//! `DeviceBridge` Library
//!
//! Core functionality for the device bridge:
//! - `SQLite` persistence gateway with encrypted callback URLs and keyset paging
//! - Device to hub affinity cache with batched renewal and garbage collection
//! - Webhook subscription registry
//! - Twin reads and reported-property writes routed through the cache

pub mod bridge;
pub mod error;
pub mod hub;
pub mod hub_cache;
pub mod jobs;
pub mod storage;
pub mod subscriptions;

#[cfg(test)]
mod test_helpers;

pub use bridge::TwinBridge;
pub use error::BridgeError;
pub use hub::{HubError, HubTwinClient, SubscriptionHealth, TwinWatcher};
pub use hub_cache::HubCache;
pub use subscriptions::{DeviceSubscriptionStatus, RegistryError, SubscriptionRegistry};
