//! Background work: renewal flushing and hub cache garbage collection.
//!
//! Both jobs run off the request path, independently of each other, and stop
//! when their cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use devbridge_core::config::HubCacheConfig;

use crate::hub_cache::HubCache;
use crate::storage::{BridgeStore, StorageError};

/// Shortest period either job will tick at.
pub const MIN_JOB_INTERVAL: Duration = Duration::from_secs(1);

/// Handles of the two hub cache background jobs.
pub struct HubCacheJobs {
    pub renewal: JoinHandle<()>,
    pub gc: JoinHandle<()>,
}

impl HubCacheJobs {
    /// Wait for both jobs to stop.
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.renewal.await?;
        self.gc.await
    }
}

/// Start the renewal flusher and GC job for `cache` with configured periods.
pub fn spawn_hub_cache_jobs(
    store: Arc<dyn BridgeStore>,
    cache: Arc<HubCache>,
    config: &HubCacheConfig,
    cancel: CancellationToken,
) -> HubCacheJobs {
    let renewal = spawn_renewal_flusher(
        Arc::clone(&cache),
        Duration::from_secs(config.renewal_interval_secs),
        cancel.clone(),
    );
    let gc = spawn_gc_job(
        store,
        Some(cache),
        Duration::from_secs(config.gc_interval_secs),
        cancel,
    );
    HubCacheJobs { renewal, gc }
}

/// Flush queued renewals every `interval`, or earlier when the queue fills.
///
/// Pending renewals are flushed one last time after cancellation. Periods
/// below [`MIN_JOB_INTERVAL`] are raised to it.
pub fn spawn_renewal_flusher(
    cache: Arc<HubCache>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let interval = interval.max(MIN_JOB_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // Skip first immediate tick

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                () = cache.renewals().filled() => {}
            }
            flush(&cache, &cancel).await;
        }

        flush(&cache, &CancellationToken::new()).await;
        info!("Renewal flusher stopped");
    })
}

async fn flush(cache: &HubCache, cancel: &CancellationToken) {
    match cache.flush_renewals(cancel).await {
        Ok(0) => {}
        Ok(flushed) => info!(flushed, "Hub cache renewals written"),
        Err(e) => warn!(error = %e, "Hub cache renewal flush failed, batch dropped"),
    }
}

/// Run garbage collection every `interval`.
///
/// When a cache is given it is re-warmed after rows were removed so the
/// in-memory map forgets them too. Periods below [`MIN_JOB_INTERVAL`] are
/// raised to it.
pub fn spawn_gc_job(
    store: Arc<dyn BridgeStore>,
    cache: Option<Arc<HubCache>>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let interval = interval.max(MIN_JOB_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // Skip first immediate tick

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match collect_garbage(store.as_ref(), cache.as_deref(), &cancel).await {
                Ok(removed) if removed > 0 => {
                    info!(removed, "Background hub cache GC completed");
                }
                Err(e) => {
                    warn!(error = %e, "Background hub cache GC failed");
                }
                _ => {}
            }
        }

        info!("Hub cache GC job stopped");
    })
}

/// One garbage collection pass. Returns the number of rows removed.
pub async fn collect_garbage(
    store: &dyn BridgeStore,
    cache: Option<&HubCache>,
    cancel: &CancellationToken,
) -> Result<u64, StorageError> {
    let removed = store.garbage_collect_hub_cache().await?;
    if removed > 0
        && let Some(cache) = cache
    {
        cache.warm(cancel.clone()).await?;
    }
    Ok(removed)
}
