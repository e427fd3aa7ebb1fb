//! Shared test doubles for the bridge's ports.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use devbridge_crypto::{CallbackCipher, CryptoError, Encryptor};
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use crate::hub::{HubError, HubTwinClient, SubscriptionHealth, TwinWatcher};
use crate::storage::{BridgeDatabase, SubscriptionType};

pub const TEST_SECRET: &[u8] = b"devbridge-test-master-secret-0001";

/// Real cipher that counts calls.
pub struct CountingEncryptor {
    cipher: CallbackCipher,
    pub encrypts: AtomicUsize,
    pub decrypts: AtomicUsize,
}

impl CountingEncryptor {
    pub fn new() -> Self {
        Self {
            cipher: CallbackCipher::from_master_secret(TEST_SECRET).unwrap(),
            encrypts: AtomicUsize::new(0),
            decrypts: AtomicUsize::new(0),
        }
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Encryptor for CountingEncryptor {
    async fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        self.encrypts.fetch_add(1, Ordering::SeqCst);
        self.cipher.seal(plaintext)
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        self.cipher.open(ciphertext)
    }
}

pub async fn test_db() -> BridgeDatabase {
    test_db_with(Arc::new(CountingEncryptor::new())).await
}

pub async fn test_db_with(encryptor: Arc<CountingEncryptor>) -> BridgeDatabase {
    BridgeDatabase::open_in_memory(encryptor).await.unwrap()
}

/// Hub client with a fixed device to hub directory.
#[derive(Default)]
pub struct FakeHubClient {
    /// Where discovery says each device lives.
    pub directory: Mutex<HashMap<String, String>>,
    /// Devices that actually exist on each hub.
    pub provisioned: Mutex<HashSet<(String, String)>>,
    pub discoveries: AtomicUsize,
    pub patches: Mutex<Vec<(String, String, Map<String, Value>)>>,
}

impl FakeHubClient {
    pub async fn place(&self, device_id: &str, hub: &str) {
        self.directory
            .lock()
            .await
            .insert(device_id.to_string(), hub.to_string());
        self.provisioned
            .lock()
            .await
            .insert((hub.to_string(), device_id.to_string()));
    }

    pub fn discovery_calls(&self) -> usize {
        self.discoveries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HubTwinClient for FakeHubClient {
    async fn discover_hub(&self, device_id: &str) -> Result<String, HubError> {
        self.discoveries.fetch_add(1, Ordering::SeqCst);
        self.directory
            .lock()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| HubError::DeviceNotFound(device_id.to_string()))
    }

    async fn get_twin(&self, hub: &str, device_id: &str) -> Result<Value, HubError> {
        if self
            .provisioned
            .lock()
            .await
            .contains(&(hub.to_string(), device_id.to_string()))
        {
            Ok(json!({ "deviceId": device_id, "hub": hub, "properties": { "desired": {}, "reported": {} } }))
        } else {
            Err(HubError::DeviceNotFound(device_id.to_string()))
        }
    }

    async fn update_reported_properties(
        &self,
        hub: &str,
        device_id: &str,
        patch: &Map<String, Value>,
    ) -> Result<(), HubError> {
        if !self
            .provisioned
            .lock()
            .await
            .contains(&(hub.to_string(), device_id.to_string()))
        {
            return Err(HubError::DeviceNotFound(device_id.to_string()));
        }
        self.patches
            .lock()
            .await
            .push((hub.to_string(), device_id.to_string(), patch.clone()));
        Ok(())
    }
}

/// Watcher that records every call.
#[derive(Default)]
pub struct RecordingWatcher {
    pub calls: Mutex<Vec<String>>,
    pub armed: Mutex<HashSet<(String, SubscriptionType)>>,
}

impl RecordingWatcher {
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl TwinWatcher for RecordingWatcher {
    async fn arm(&self, device_id: &str, subscription_type: SubscriptionType) -> Result<(), HubError> {
        self.calls
            .lock()
            .await
            .push(format!("arm {device_id} {subscription_type}"));
        self.armed
            .lock()
            .await
            .insert((device_id.to_string(), subscription_type));
        Ok(())
    }

    async fn disarm(
        &self,
        device_id: &str,
        subscription_type: SubscriptionType,
    ) -> Result<(), HubError> {
        self.calls
            .lock()
            .await
            .push(format!("disarm {device_id} {subscription_type}"));
        self.armed
            .lock()
            .await
            .remove(&(device_id.to_string(), subscription_type));
        Ok(())
    }

    async fn release(&self, device_id: &str) -> Result<(), HubError> {
        self.calls.lock().await.push(format!("release {device_id}"));
        Ok(())
    }

    async fn status(&self, device_id: &str, subscription_type: SubscriptionType) -> SubscriptionHealth {
        if self
            .armed
            .lock()
            .await
            .contains(&(device_id.to_string(), subscription_type))
        {
            SubscriptionHealth::Running
        } else {
            SubscriptionHealth::Stopped
        }
    }
}
