//! Persistence gateway for `DeviceBridge`.
//!
//! Sole point of contact with the relational store. Callback URLs are
//! encrypted on every write and decrypted on every read; full-table listings
//! are paged so memory stays bounded by the page size.

mod db;
mod gateway;
mod models;
mod paging;
mod queries_hub_cache;
mod queries_subscriptions;
mod rows;


pub use db::BridgeDatabase;
pub use devbridge_core::db::StorageError;
pub use gateway::{BridgeStore, RowStream};
pub use models::*;
pub use paging::PAGE_SIZE;
pub use queries_hub_cache::{HUB_CACHE_RETENTION_SECS, RENEW_BATCH_SIZE};
