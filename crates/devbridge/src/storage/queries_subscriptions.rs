//! Device subscription queries.

use devbridge_core::db::{StorageError, unix_timestamp};
use tokio_util::sync::CancellationToken;

use super::db::BridgeDatabase;
use super::gateway::RowStream;
use super::models::{DeviceSubscription, SubscriptionType};
use super::paging::{PAGE_LIMIT, paginate};
use super::rows::SubscriptionRow;

/// Paging cursor: `(device_id, subscription_type)` of the last row seen.
type SubscriptionKey = (String, String);

fn subscription_key(sub: &DeviceSubscription) -> SubscriptionKey {
    (
        sub.device_id.clone(),
        sub.subscription_type.as_str().to_string(),
    )
}

impl BridgeDatabase {
    // =========================================================================
    // Subscription queries
    // =========================================================================

    /// Stream every subscription, ordered by device id then type.
    pub fn list_all_subscriptions(
        &self,
        cancel: CancellationToken,
    ) -> RowStream<'_, DeviceSubscription> {
        paginate(cancel, subscription_key, move |after| {
            self.fetch_subscription_page(after)
        })
    }

    async fn fetch_subscription_page(
        &self,
        after: Option<SubscriptionKey>,
    ) -> Result<Vec<DeviceSubscription>, StorageError> {
        let rows = match after {
            None => {
                sqlx::query_as::<_, SubscriptionRow>(
                    "SELECT device_id, subscription_type, callback_url, created_at \
                     FROM device_subscriptions \
                     ORDER BY device_id, subscription_type LIMIT ?",
                )
                .bind(PAGE_LIMIT)
                .fetch_all(self.pool())
                .await?
            }
            Some((device_id, subscription_type)) => {
                sqlx::query_as::<_, SubscriptionRow>(
                    "SELECT device_id, subscription_type, callback_url, created_at \
                     FROM device_subscriptions \
                     WHERE (device_id, subscription_type) > (?, ?) \
                     ORDER BY device_id, subscription_type LIMIT ?",
                )
                .bind(device_id)
                .bind(subscription_type)
                .bind(PAGE_LIMIT)
                .fetch_all(self.pool())
                .await?
            }
        };

        self.decode_subscriptions(rows).await
    }

    /// All subscriptions of one device. Bounded by the number of types.
    pub async fn list_subscriptions_for_device(
        &self,
        device_id: &str,
    ) -> Result<Vec<DeviceSubscription>, StorageError> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT device_id, subscription_type, callback_url, created_at \
             FROM device_subscriptions WHERE device_id = ? ORDER BY subscription_type",
        )
        .bind(device_id)
        .fetch_all(self.pool())
        .await?;

        self.decode_subscriptions(rows).await
    }

    /// Whether any subscription row exists for the device.
    pub async fn has_subscriptions(&self, device_id: &str) -> Result<bool, StorageError> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM device_subscriptions WHERE device_id = ?)",
        )
        .bind(device_id)
        .fetch_one(self.pool())
        .await?;

        Ok(exists != 0)
    }

    /// Get one subscription, or `None` if the device has none of that type.
    pub async fn get_subscription(
        &self,
        device_id: &str,
        subscription_type: SubscriptionType,
    ) -> Result<Option<DeviceSubscription>, StorageError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT device_id, subscription_type, callback_url, created_at \
             FROM device_subscriptions WHERE device_id = ? AND subscription_type = ?",
        )
        .bind(device_id)
        .bind(subscription_type.as_str())
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(row.decode(self.encryptor()).await?)),
            None => Ok(None),
        }
    }

    /// Create or update a subscription.
    ///
    /// The URL is encrypted before it reaches the store. On conflict only the
    /// URL is replaced; `created_at` keeps its first-insert value.
    pub async fn upsert_subscription(
        &self,
        device_id: &str,
        subscription_type: SubscriptionType,
        callback_url: &str,
    ) -> Result<DeviceSubscription, StorageError> {
        let sealed = self.seal_url(callback_url).await?;
        let now = unix_timestamp();

        let created_at: i64 = sqlx::query_scalar(
            "INSERT INTO device_subscriptions (device_id, subscription_type, callback_url, created_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(device_id, subscription_type) DO UPDATE SET callback_url = excluded.callback_url \
             RETURNING created_at",
        )
        .bind(device_id)
        .bind(subscription_type.as_str())
        .bind(&sealed)
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        Ok(DeviceSubscription {
            device_id: device_id.to_string(),
            subscription_type,
            callback_url: callback_url.to_string(),
            created_at,
        })
    }

    /// Delete a subscription. Deleting a missing row succeeds.
    pub async fn delete_subscription(
        &self,
        device_id: &str,
        subscription_type: SubscriptionType,
    ) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM device_subscriptions WHERE device_id = ? AND subscription_type = ?")
            .bind(device_id)
            .bind(subscription_type.as_str())
            .execute(self.pool())
            .await?;

        Ok(())
    }

    async fn decode_subscriptions(
        &self,
        rows: Vec<SubscriptionRow>,
    ) -> Result<Vec<DeviceSubscription>, StorageError> {
        let mut subscriptions = Vec::with_capacity(rows.len());
        for row in rows {
            subscriptions.push(row.decode(self.encryptor()).await?);
        }
        Ok(subscriptions)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Run a raw maintenance statement, returning the rows it affected.
    pub async fn execute(&self, statement: &str) -> Result<u64, StorageError> {
        let result = sqlx::raw_sql(statement).execute(self.pool()).await?;
        Ok(result.rows_affected())
    }
}
