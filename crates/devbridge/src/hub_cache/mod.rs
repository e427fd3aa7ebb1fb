//! Device to hub affinity cache.
//!
//! Resolving a device consults an in-memory map warmed from the `hub_cache`
//! table. Hits are answered immediately and queued for a batched renewal;
//! misses go to hub discovery and the answer is persisted. Stale, orphaned
//! rows are removed by the periodic garbage collection job.

mod renewal;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use devbridge_core::config::HubCacheConfig;
use tokio::sync::RwLock;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::BridgeError;
use crate::hub::HubTwinClient;
use crate::storage::{BridgeStore, StorageError};

pub use renewal::RenewalQueue;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CachedHub {
    hub: String,
    /// Value of the cache generation counter when this entry was written.
    generation: u64,
}

/// Device to hub lookup with lazy population and batched renewal.
pub struct HubCache {
    store: Arc<dyn BridgeStore>,
    client: Arc<dyn HubTwinClient>,
    hubs: RwLock<HashMap<String, CachedHub>>,
    generation: AtomicU64,
    renewals: RenewalQueue,
}

impl HubCache {
    pub fn new(
        store: Arc<dyn BridgeStore>,
        client: Arc<dyn HubTwinClient>,
        renewal_threshold: usize,
    ) -> Self {
        Self {
            store,
            client,
            hubs: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            renewals: RenewalQueue::new(renewal_threshold),
        }
    }

    /// Build a cache whose renewal threshold comes from configuration.
    pub fn from_config(
        store: Arc<dyn BridgeStore>,
        client: Arc<dyn HubTwinClient>,
        config: &HubCacheConfig,
    ) -> Self {
        Self::new(store, client, config.renewal_batch_threshold)
    }

    /// Reload the in-memory map from the table.
    ///
    /// Entries missing from the table are dropped, except those discovered
    /// after the listing started. Returns the number of rows loaded. On error
    /// the previous map is kept.
    pub async fn warm(&self, cancel: CancellationToken) -> Result<usize, StorageError> {
        let started = self.generation.load(Ordering::SeqCst);
        let mut entries = self.store.list_hub_cache_entries(cancel);
        let mut snapshot = HashMap::new();
        while let Some(entry) = entries.next().await {
            let entry = entry?;
            snapshot.insert(entry.device_id, entry.hub);
        }

        let count = snapshot.len();
        let mut hubs = self.hubs.write().await;
        let current = std::mem::take(&mut *hubs);
        *hubs = merge_warmed(current, snapshot, started);
        info!(entries = count, cached = hubs.len(), "Hub cache warmed");
        Ok(count)
    }

    /// Resolve the hub serving `device_id`.
    ///
    /// A hit never writes on the request path; the device is queued for the
    /// next renewal flush instead.
    pub async fn resolve(&self, device_id: &str) -> Result<String, BridgeError> {
        let cached = self.cached_hub(device_id).await;
        if let Some(hub) = cached {
            self.renewals.schedule(device_id).await;
            return Ok(hub);
        }

        let hub = self.client.discover_hub(device_id).await?;
        self.store.upsert_hub_cache_entry(device_id, &hub).await?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.hubs.write().await.insert(
            device_id.to_string(),
            CachedHub {
                hub: hub.clone(),
                generation,
            },
        );

        debug!(device_id = %device_id, hub = %hub, "Hub discovered and cached");
        Ok(hub)
    }

    /// The cached hub for a device, if any, without side effects.
    pub async fn cached_hub(&self, device_id: &str) -> Option<String> {
        self.hubs
            .read()
            .await
            .get(device_id)
            .map(|entry| entry.hub.clone())
    }

    /// Forget the in-memory mapping so the next resolve rediscovers.
    pub async fn evict(&self, device_id: &str) -> bool {
        let removed = self.hubs.write().await.remove(device_id).is_some();
        if removed {
            debug!(device_id = %device_id, "Hub cache entry evicted");
        }
        removed
    }

    /// Write all queued renewals to the store in one bulk operation.
    ///
    /// Returns how many devices were flushed. A failed flush drops the batch;
    /// devices that keep resolving are queued again.
    pub async fn flush_renewals(&self, cancel: &CancellationToken) -> Result<usize, StorageError> {
        let device_ids = self.renewals.take().await;
        if device_ids.is_empty() {
            return Ok(0);
        }

        self.store.renew_hub_cache_entries(&device_ids, cancel).await?;
        debug!(devices = device_ids.len(), "Hub cache renewals flushed");
        Ok(device_ids.len())
    }

    pub const fn renewals(&self) -> &RenewalQueue {
        &self.renewals
    }

    pub async fn len(&self) -> usize {
        self.hubs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.hubs.read().await.is_empty()
    }
}

/// Rebuild the map from a table snapshot taken at generation `started`.
/// Entries written after `started` win over the snapshot.
fn merge_warmed(
    current: HashMap<String, CachedHub>,
    snapshot: HashMap<String, String>,
    started: u64,
) -> HashMap<String, CachedHub> {
    let mut merged: HashMap<String, CachedHub> = snapshot
        .into_iter()
        .map(|(device_id, hub)| {
            (
                device_id,
                CachedHub {
                    hub,
                    generation: started,
                },
            )
        })
        .collect();
    merged.extend(
        current
            .into_iter()
            .filter(|(_, entry)| entry.generation > started),
    );
    merged
}
