//! Errors surfaced by the hub-facing request path.

use crate::hub::HubError;
use crate::storage::StorageError;

/// Hub cache and twin bridge errors.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// No hub knows the device yet. Callers poll with backoff; the bridge
    /// does not retry on their behalf.
    #[error("Device not provisioned: {0}")]
    NotProvisioned(String),

    #[error("Hub error: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<HubError> for BridgeError {
    fn from(e: HubError) -> Self {
        match e {
            HubError::DeviceNotFound(device_id) => Self::NotProvisioned(device_id),
            HubError::Upstream(msg) => Self::Upstream(msg),
        }
    }
}
