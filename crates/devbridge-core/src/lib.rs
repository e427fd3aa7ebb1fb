//! `DeviceBridge` Core Library
//!
//! Shared functionality for `DeviceBridge` components:
//! - `SQLite` pool helpers and the storage error type
//! - Configuration resolution and hierarchy
//! - Tracing initialisation
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod tracing_init;

pub use config::Config;
pub use db::StorageError;
pub use error::{Error, Result};
