//! End-to-end flow over an on-disk database: subscribe, resolve, GC, reopen.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use devbridge::jobs::collect_garbage;
use devbridge::storage::{BridgeDatabase, SubscriptionType};
use devbridge::{
    BridgeError, HubCache, HubError, HubTwinClient, SubscriptionHealth, SubscriptionRegistry,
    TwinBridge,
};
use devbridge_core::config::DatabaseConfig;
use devbridge_crypto::CallbackCipher;

const SECRET_HEX: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";

#[derive(Default)]
struct StaticHubs {
    hubs: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl HubTwinClient for StaticHubs {
    async fn discover_hub(&self, device_id: &str) -> Result<String, HubError> {
        self.hubs
            .lock()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| HubError::DeviceNotFound(device_id.to_string()))
    }

    async fn get_twin(&self, hub: &str, device_id: &str) -> Result<Value, HubError> {
        Ok(json!({ "deviceId": device_id, "hub": hub }))
    }

    async fn update_reported_properties(
        &self,
        _hub: &str,
        _device_id: &str,
        _patch: &Map<String, Value>,
    ) -> Result<(), HubError> {
        Ok(())
    }
}

async fn open(path: &std::path::Path) -> BridgeDatabase {
    let cipher = CallbackCipher::from_hex_secret(SECRET_HEX).unwrap();
    BridgeDatabase::open(path, &DatabaseConfig::default(), Arc::new(cipher))
        .await
        .unwrap()
}

#[tokio::test]
async fn subscription_survives_reopen_and_stays_encrypted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.db");

    {
        let db = open(&path).await;
        let registry = SubscriptionRegistry::new(Arc::new(db.clone()));
        let saved = registry
            .create_or_update(
                "dev-1",
                SubscriptionType::DesiredProperties,
                "https://hooks.example/dev-1",
            )
            .await
            .unwrap();
        assert_eq!(saved.status, SubscriptionHealth::Unmonitored);

        let raw: String = sqlx::query_scalar("SELECT callback_url FROM device_subscriptions")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_ne!(raw, "https://hooks.example/dev-1");
        db.pool().close().await;
    }

    let db = open(&path).await;
    let registry = SubscriptionRegistry::new(Arc::new(db));
    let got = registry
        .get("dev-1", SubscriptionType::DesiredProperties)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got.subscription.callback_url, "https://hooks.example/dev-1");

    registry
        .delete("dev-1", SubscriptionType::DesiredProperties)
        .await
        .unwrap();
    assert!(registry
        .get("dev-1", SubscriptionType::DesiredProperties)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn twin_requests_populate_cache_and_gc_keeps_subscribed_devices() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir.path().join("bridge.db")).await;

    let client = Arc::new(StaticHubs::default());
    for device in ["subscribed", "orphan"] {
        client
            .hubs
            .lock()
            .await
            .insert(device.to_string(), "hub-1".to_string());
    }

    let cache = Arc::new(HubCache::new(
        Arc::new(db.clone()),
        Arc::clone(&client) as _,
        1000,
    ));
    let bridge = TwinBridge::new(Arc::clone(&cache), Arc::clone(&client) as _);

    assert_eq!(bridge.get_twin("subscribed").await.unwrap()["hub"], "hub-1");
    assert_eq!(bridge.get_twin("orphan").await.unwrap()["hub"], "hub-1");
    assert!(matches!(
        bridge.get_twin("unknown").await,
        Err(BridgeError::NotProvisioned(_))
    ));

    SubscriptionRegistry::new(Arc::new(db.clone()))
        .create_or_update("subscribed", SubscriptionType::Methods, "http://cb")
        .await
        .unwrap();

    // Age both rows past the retention window.
    sqlx::query("UPDATE hub_cache SET renewed_at = 0")
        .execute(db.pool())
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let removed = collect_garbage(&db, Some(&cache), &cancel).await.unwrap();
    assert_eq!(removed, 1);

    let remaining: Vec<_> = db
        .list_hub_cache_entries(cancel)
        .map(|e| e.unwrap().device_id)
        .collect()
        .await;
    assert_eq!(remaining, vec!["subscribed"]);
    assert!(cache.cached_hub("orphan").await.is_none());
    assert_eq!(cache.cached_hub("subscribed").await.as_deref(), Some("hub-1"));
}
