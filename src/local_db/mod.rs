//! # Local Database Module
//!
//! Durable local storage for the offline-first engine, backed by SQLite.
//! Everything the engine must not lose across a process restart lives here:
//! entity snapshots, captured asset blobs and the sync queue.
//!
//! ## Architecture
//!
//! - **Snapshots**: one row per entity, overwritten wholesale on each save
//! - **Assets**: raw bytes in a `BLOB` column with separate metadata columns
//! - **Sync Queue**: ordered rows of pending mutations with retry bookkeeping
//! - **Sync Metadata**: small key/value table (last successful sync, ...)
//!
//! Every write is a single statement, so readers never observe a partially
//! written record. Concurrent writers to the same record resolve by last
//! writer wins.
//!
//! ## Key Components
//!
//! - `LocalDatabase`: connection pool and schema management
//! - `schema.sql`: version 1 of the schema
//! - `snapshots.rs`: entity snapshot save/load/delete
//! - `assets.rs`: asset blob storage
//! - `sync.rs`: sync queue rows and sync metadata
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync::local_db::LocalDatabase;
//!
//! # async fn example() -> fieldsync::local_db::Result<()> {
//! let db = LocalDatabase::open("/tmp/fieldsync/local.db").await?;
//! let snapshot = db.load_snapshot("entity-42").await?;
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod snapshots;
pub mod sync;

pub use assets::{AssetBlob, AssetMeta};
pub use sync::{
    QueueCounts, QueueItemId, QueueItemType, QueuePayload, QueueRow, QueueStatus, SyncQueueItem,
};

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Ordered schema migrations; each entry is applied once
const MIGRATIONS: &[(i32, &str)] = &[(1, include_str!("schema.sql"))];

/// Latest schema version known to this build
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Result type for local database operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Local store failure
///
/// Covers quota exhaustion and corruption as reported by SQLite. These
/// errors are never retried by the engine.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record {key}: {message}")]
    Corrupt { key: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub(crate) fn corrupt(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Local database connection manager
///
/// Cheap to clone; clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
}

impl LocalDatabase {
    /// Open or create the local database at `path`
    ///
    /// Creates the parent directory and the file when missing, then
    /// initializes the schema. Uses WAL mode so readers do not block the
    /// sync processor's writes.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;

        tracing::debug!(path = %path.display(), "local database opened");
        Ok(db)
    }

    /// Initialize database schema
    ///
    /// Applies every migration newer than the recorded version, each one in
    /// its own transaction together with its bookkeeping row.
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current_version = self.schema_version().await?;

        for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current_version) {
            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(sql).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(format_timestamp(Utc::now()))
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            tracing::info!(version, "applied local schema migration");
        }

        Ok(())
    }

    /// Current schema version recorded in the database
    pub async fn schema_version(&self) -> Result<i32> {
        let version: (i32,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;
        Ok(version.0)
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection
    ///
    /// Used on shutdown and by tests that simulate a process restart.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get database statistics
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let snapshot_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM snapshots")
            .fetch_one(&self.pool)
            .await?;

        let asset_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM assets")
            .fetch_one(&self.pool)
            .await?;

        let unsynced_assets: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM assets WHERE synced = 0")
                .fetch_one(&self.pool)
                .await?;

        let queue_items: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sync_queue")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStats {
            snapshot_count: snapshot_count.0 as u64,
            asset_count: asset_count.0 as u64,
            unsynced_assets: unsynced_assets.0 as u64,
            queue_items: queue_items.0 as u64,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Entity snapshots stored locally
    pub snapshot_count: u64,
    /// Asset blobs stored locally
    pub asset_count: u64,
    /// Asset blobs not yet confirmed by the remote
    pub unsynced_assets: u64,
    /// Sync queue rows in any status
    pub queue_items: u64,
}

/// Fixed-width RFC 3339 rendering so stored timestamps sort lexically
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(key: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StorageError::corrupt(key, format!("bad timestamp {raw:?}: {e}")))
}
