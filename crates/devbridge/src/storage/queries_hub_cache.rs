//! Hub cache queries: paged listing, upsert, bulk renewal and garbage collection.

use std::time::Duration;

use devbridge_core::db::{StorageError, unix_timestamp};
use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::db::BridgeDatabase;
use super::gateway::RowStream;
use super::models::HubCacheEntry;
use super::paging::{PAGE_LIMIT, paginate};
use super::rows::HubCacheRow;

/// Entries older than this with no subscription are collected. 7 days.
pub const HUB_CACHE_RETENTION_SECS: i64 = 7 * 24 * 60 * 60;

/// Device ids staged per insert during bulk renewal.
pub const RENEW_BATCH_SIZE: usize = 1000;

/// Upper bound on staging all ids of one renewal.
const RENEW_STAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound on the set-based update of one renewal.
const RENEW_UPDATE_TIMEOUT: Duration = Duration::from_secs(300);

fn hub_cache_key(entry: &HubCacheEntry) -> String {
    entry.device_id.clone()
}

impl BridgeDatabase {
    // =========================================================================
    // Hub cache queries
    // =========================================================================

    /// Stream every hub cache entry, ordered by device id.
    pub fn list_hub_cache_entries(&self, cancel: CancellationToken) -> RowStream<'_, HubCacheEntry> {
        paginate(cancel, hub_cache_key, move |after| {
            self.fetch_hub_cache_page(after)
        })
    }

    async fn fetch_hub_cache_page(
        &self,
        after: Option<String>,
    ) -> Result<Vec<HubCacheEntry>, StorageError> {
        let rows = match after {
            None => {
                sqlx::query_as::<_, HubCacheRow>(
                    "SELECT device_id, hub, renewed_at FROM hub_cache ORDER BY device_id LIMIT ?",
                )
                .bind(PAGE_LIMIT)
                .fetch_all(self.pool())
                .await?
            }
            Some(device_id) => {
                sqlx::query_as::<_, HubCacheRow>(
                    "SELECT device_id, hub, renewed_at FROM hub_cache \
                     WHERE device_id > ? ORDER BY device_id LIMIT ?",
                )
                .bind(device_id)
                .bind(PAGE_LIMIT)
                .fetch_all(self.pool())
                .await?
            }
        };

        Ok(rows.into_iter().map(HubCacheRow::decode).collect())
    }

    /// Insert or replace the hub for a device, marking it freshly renewed.
    pub async fn upsert_hub_cache_entry(
        &self,
        device_id: &str,
        hub: &str,
    ) -> Result<(), StorageError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO hub_cache (device_id, hub, renewed_at) VALUES (?, ?, ?) \
             ON CONFLICT(device_id) DO UPDATE SET hub = excluded.hub, renewed_at = excluded.renewed_at",
        )
        .bind(device_id)
        .bind(hub)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Bump `renewed_at` for many devices with one set-based update.
    ///
    /// The ids are staged into a temporary table on a single connection in
    /// batches of [`RENEW_BATCH_SIZE`], joined against `hub_cache` once, and
    /// the staging table is dropped before the connection goes back to the
    /// pool. Ids without an entry are ignored. `cancel` is checked before
    /// every batch and before the update.
    pub async fn renew_hub_cache_entries(
        &self,
        device_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), StorageError> {
        if device_ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.pool().acquire().await?;

        sqlx::query("DROP TABLE IF EXISTS temp.cache_entries_to_renew")
            .execute(&mut *conn)
            .await?;
        sqlx::query("CREATE TEMP TABLE cache_entries_to_renew (device_id TEXT NOT NULL PRIMARY KEY)")
            .execute(&mut *conn)
            .await?;

        let renewed = renew_staged(&mut conn, device_ids, cancel).await;

        // Temp tables live as long as the connection, which outlives this call.
        let dropped = sqlx::query("DROP TABLE IF EXISTS temp.cache_entries_to_renew")
            .execute(&mut *conn)
            .await;

        let renewed = renewed?;
        dropped?;

        debug!(requested = device_ids.len(), renewed, "Hub cache entries renewed");
        Ok(())
    }

    /// Delete hub cache rows that have no subscription for their device and
    /// were last renewed before the retention window. Both must hold.
    pub async fn garbage_collect_hub_cache(&self) -> Result<u64, StorageError> {
        let cutoff = unix_timestamp() - HUB_CACHE_RETENTION_SECS;

        let result = sqlx::query(
            "DELETE FROM hub_cache \
             WHERE renewed_at < ? \
             AND NOT EXISTS (SELECT 1 FROM device_subscriptions s WHERE s.device_id = hub_cache.device_id)",
        )
        .bind(cutoff)
        .execute(self.pool())
        .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            info!(removed, "Collected stale hub cache entries");
        }

        Ok(removed)
    }
}

/// Stage `device_ids` and run the joined update. Returns rows updated.
async fn renew_staged(
    conn: &mut SqliteConnection,
    device_ids: &[String],
    cancel: &CancellationToken,
) -> Result<u64, StorageError> {
    tokio::time::timeout(RENEW_STAGE_TIMEOUT, stage_device_ids(conn, device_ids, cancel))
        .await
        .map_err(|_| StorageError::Timeout("staging hub cache renewals".into()))??;

    if cancel.is_cancelled() {
        return Err(StorageError::Cancelled);
    }

    let update = sqlx::query(
        "UPDATE hub_cache SET renewed_at = ? \
         WHERE device_id IN (SELECT device_id FROM cache_entries_to_renew)",
    )
    .bind(unix_timestamp())
    .execute(&mut *conn);

    let result = tokio::time::timeout(RENEW_UPDATE_TIMEOUT, update)
        .await
        .map_err(|_| StorageError::Timeout("renewing hub cache entries".into()))??;

    Ok(result.rows_affected())
}

/// Bulk-load ids into the staging table inside one transaction.
async fn stage_device_ids(
    conn: &mut SqliteConnection,
    device_ids: &[String],
    cancel: &CancellationToken,
) -> Result<(), StorageError> {
    let mut tx = conn.begin().await?;

    for (batch, ids) in device_ids.chunks(RENEW_BATCH_SIZE).enumerate() {
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new("INSERT OR IGNORE INTO cache_entries_to_renew (device_id) ");
        builder.push_values(ids, |mut row, id| {
            row.push_bind(id.as_str());
        });
        builder.build().execute(&mut *tx).await?;

        debug!(batch, rows = ids.len(), "Staged renewal batch");
    }

    tx.commit().await?;
    Ok(())
}
