//! `SQLite` database for the `DeviceBridge` gateway.

use std::path::Path;
use std::sync::Arc;

use devbridge_core::config::DatabaseConfig;
use devbridge_core::db::{StorageError, open_pool, open_pool_in_memory};
use devbridge_crypto::Encryptor;
use sqlx::{Pool, Sqlite};
use tracing::info;

/// Pooled store handle. Each operation checks a connection out of the pool
/// and returns it when the operation ends, on every exit path.
#[derive(Clone)]
pub struct BridgeDatabase {
    pool: Pool<Sqlite>,
    encryptor: Arc<dyn Encryptor>,
}

impl BridgeDatabase {
    /// Open or create a database at the given path.
    pub async fn open(
        path: &Path,
        config: &DatabaseConfig,
        encryptor: Arc<dyn Encryptor>,
    ) -> Result<Self, StorageError> {
        let pool = open_pool(path, config).await?;
        let db = Self { pool, encryptor };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub async fn open_in_memory(encryptor: Arc<dyn Encryptor>) -> Result<Self, StorageError> {
        let pool = open_pool_in_memory().await?;
        let db = Self { pool, encryptor };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        info!("Bridge database migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub(super) fn encryptor(&self) -> &dyn Encryptor {
        self.encryptor.as_ref()
    }

    /// Encrypt a callback URL for storage.
    pub(super) async fn seal_url(&self, callback_url: &str) -> Result<String, StorageError> {
        self.encryptor
            .encrypt(callback_url)
            .await
            .map_err(|e| StorageError::Encryption(e.to_string()))
    }
}
