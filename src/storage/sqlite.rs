//! SQLite-backed durable store.
//!
//! One key/value table holding the serialized ad store under a single key.
//! WAL mode is enabled so UI-style readers can query while the scheduler
//! writes.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info};
use sqlx::{Pool, Row, Sqlite, SqlitePool};

use super::DurableStore;
use crate::config::STORE_KEY;
use crate::error_handling::StorageError;
use crate::utils::now_ms;

/// Durable store persisting to a SQLite database file.
pub struct SqliteStore {
    pool: Arc<Pool<Sqlite>>,
}

impl SqliteStore {
    /// Opens (creating if necessary) the database at `db_path` and ensures
    /// the schema exists.
    pub async fn connect(db_path: &Path) -> Result<Self, StorageError> {
        let pool = init_db_pool_with_path(db_path).await?;
        init_schema(pool.as_ref()).await?;
        Ok(Self { pool })
    }

    /// Builds a store over an existing pool (shared with other tables).
    pub async fn from_pool(pool: Arc<Pool<Sqlite>>) -> Result<Self, StorageError> {
        init_schema(pool.as_ref()).await?;
        Ok(Self { pool })
    }
}

/// Initializes and returns a database connection pool.
///
/// Creates the database file if it doesn't exist and enables WAL mode for
/// better concurrent access.
pub async fn init_db_pool_with_path(db_path: &Path) -> Result<Arc<Pool<Sqlite>>, StorageError> {
    let db_path_str = db_path.to_string_lossy().to_string();
    match OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(&db_path_str)
    {
        Ok(_) => info!("Database file created successfully."),
        Err(ref e) if e.kind() == ErrorKind::AlreadyExists => {
            info!("Database file already exists.")
        }
        Err(e) => {
            error!("Failed to create database file: {e}");
            return Err(StorageError::FileCreationError(e.to_string()));
        }
    }

    let pool = SqlitePool::connect(&format!("sqlite:{}", db_path_str))
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {e}");
            StorageError::SqlError(e)
        })?;

    // Enable WAL mode
    sqlx::query("PRAGMA journal_mode=WAL")
        .execute(&pool)
        .await
        .map_err(StorageError::SqlError)?;

    Ok(Arc::new(pool))
}

async fn init_schema(pool: &Pool<Sqlite>) -> Result<(), StorageError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS ad_store (
            key TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn load(&self) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT payload FROM ad_store WHERE key = ?1")
            .bind(STORE_KEY)
            .fetch_optional(self.pool.as_ref())
            .await?;
        row.map(|r| r.try_get::<String, _>("payload"))
            .transpose()
            .map_err(StorageError::SqlError)
    }

    async fn save(&self, payload: &str) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO ad_store (key, payload, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                 payload = excluded.payload,
                 updated_at = excluded.updated_at",
        )
        .bind(STORE_KEY)
        .bind(payload)
        .bind(now_ms())
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }
}
