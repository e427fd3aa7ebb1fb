//! Twin reads and reported-property writes routed through the hub cache.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::error::BridgeError;
use crate::hub::{HubError, HubTwinClient};
use crate::hub_cache::HubCache;

/// Routes twin requests to the hub that owns each device.
pub struct TwinBridge {
    cache: Arc<HubCache>,
    client: Arc<dyn HubTwinClient>,
}

impl TwinBridge {
    pub const fn new(cache: Arc<HubCache>, client: Arc<dyn HubTwinClient>) -> Self {
        Self { cache, client }
    }

    /// Fetch the current twin document of a device.
    #[instrument(skip(self))]
    pub async fn get_twin(&self, device_id: &str) -> Result<Value, BridgeError> {
        let hub = self.cache.resolve(device_id).await?;
        match self.client.get_twin(&hub, device_id).await {
            Err(HubError::DeviceNotFound(_)) => {
                let hub = self.rediscover(device_id, &hub).await?;
                Ok(self.client.get_twin(&hub, device_id).await?)
            }
            other => Ok(other?),
        }
    }

    /// Apply a reported-property patch to a device twin.
    #[instrument(skip(self, patch))]
    pub async fn update_reported_properties(
        &self,
        device_id: &str,
        patch: &Map<String, Value>,
    ) -> Result<(), BridgeError> {
        let hub = self.cache.resolve(device_id).await?;
        match self
            .client
            .update_reported_properties(&hub, device_id, patch)
            .await
        {
            Err(HubError::DeviceNotFound(_)) => {
                let hub = self.rediscover(device_id, &hub).await?;
                Ok(self
                    .client
                    .update_reported_properties(&hub, device_id, patch)
                    .await?)
            }
            other => Ok(other?),
        }
    }

    /// The cached hub no longer knows the device; look it up once more.
    async fn rediscover(&self, device_id: &str, stale_hub: &str) -> Result<String, BridgeError> {
        debug!(device_id = %device_id, stale_hub = %stale_hub, "Cached hub lost device, rediscovering");
        self.cache.evict(device_id).await;
        self.cache.resolve(device_id).await
    }
}
