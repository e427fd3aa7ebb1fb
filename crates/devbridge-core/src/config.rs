//! Configuration resolution for `DeviceBridge`.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/devbridge/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete `DeviceBridge` configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub hub_cache: HubCacheConfig,
}

/// Relational store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
            busy_timeout_secs: 5,
        }
    }
}

/// Hub cache background job configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubCacheConfig {
    /// How often pending renewals are flushed (seconds).
    pub renewal_interval_secs: u64,
    /// Pending renewal count that triggers an early flush.
    pub renewal_batch_threshold: usize,
    /// How often stale, orphaned cache rows are collected (seconds). Default: daily.
    pub gc_interval_secs: u64,
}

impl Default for HubCacheConfig {
    fn default() -> Self {
        Self {
            renewal_interval_secs: 60,
            renewal_batch_threshold: 1000,
            gc_interval_secs: 24 * 60 * 60,
        }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(config_file: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            let global = load_config_file(&global_path)?;
            merge_config(&mut config, global);
        }
    }

    // An explicitly requested file must exist.
    if let Some(path) = config_file {
        let explicit = load_config_file(path)?;
        merge_config(&mut config, explicit);
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("devbridge").join("settings.json"))
}

/// Get the default database path.
pub fn default_database_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("devbridge").join("bridge.db"))
}

fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge_config(base: &mut Config, overlay: Config) {
    if overlay.database.path.is_some() {
        base.database.path = overlay.database.path;
    }
    base.database.max_connections = overlay.database.max_connections;
    base.database.busy_timeout_secs = overlay.database.busy_timeout_secs;

    base.hub_cache = overlay.hub_cache;
}

/// Apply `DEVBRIDGE_*` overrides. Unparseable values are ignored.
fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("DEVBRIDGE_DB_PATH") {
        config.database.path = Some(PathBuf::from(val));
    }
    if let Some(n) = var("DEVBRIDGE_DB_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
        config.database.max_connections = n;
    }
    if let Some(n) = var("DEVBRIDGE_RENEWAL_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
        config.hub_cache.renewal_interval_secs = n;
    }
    if let Some(n) = var("DEVBRIDGE_RENEWAL_BATCH_THRESHOLD").and_then(|v| v.parse().ok()) {
        config.hub_cache.renewal_batch_threshold = n;
    }
    if let Some(n) = var("DEVBRIDGE_GC_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
        config.hub_cache.gc_interval_secs = n;
    }
}
