//! Data models for `DeviceBridge` storage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of twin/device change a webhook subscription listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SubscriptionType {
    DesiredProperties,
    Methods,
    C2DMessages,
    ConnectionStatus,
}

impl SubscriptionType {
    pub const ALL: [Self; 4] = [
        Self::DesiredProperties,
        Self::Methods,
        Self::C2DMessages,
        Self::ConnectionStatus,
    ];

    /// Name stored in the `subscription_type` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DesiredProperties => "DesiredProperties",
            Self::Methods => "Methods",
            Self::C2DMessages => "C2DMessages",
            Self::ConnectionStatus => "ConnectionStatus",
        }
    }
}

impl fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown subscription type: {0}")]
pub struct UnknownSubscriptionType(pub String);

impl FromStr for SubscriptionType {
    type Err = UnknownSubscriptionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownSubscriptionType(s.to_string()))
    }
}

/// A registered webhook for one device and change kind.
///
/// `callback_url` is always plaintext here; only the stored column is encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSubscription {
    pub device_id: String,
    pub subscription_type: SubscriptionType,
    pub callback_url: String,
    /// Unix seconds of the first insert. Never changed by later upserts.
    pub created_at: i64,
}

/// Device to hub affinity row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubCacheEntry {
    pub device_id: String,
    pub hub: String,
    /// Unix seconds of the last confirmed use.
    pub renewed_at: i64,
}
