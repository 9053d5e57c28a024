//! FieldSync - Offline-First Sync Engine
//!
//! FieldSync keeps a field inspection editable with no network connectivity
//! and makes sure every edit eventually reaches the remote system of record,
//! without blocking the caller and without losing data across restarts.
//!
//! # Module Structure
//!
//! - **`shared`** - Configuration, error types, sync events, domain types
//! - **`local_db`** - SQLite store for snapshots, asset blobs and the queue
//! - **`offline`** - Write gateway, sync queue, retry policy,
//!   reconciliation and debounced autosave
//! - **`sync`** - Sync processor, connectivity monitor, status and metrics
//! - **`remote`** - Remote collaborator traits and their HTTP implementation
//! - **`engine`** - `FieldSync`, the application root owning every component
//!
//! # Data Flow
//!
//! ```text
//! caller -> WriteGateway -> LocalDatabase (always)
//!                        -> RemoteApi (when online)
//!                        -> SyncQueue (offline or failed)
//!                              -> SyncService (timer / reconnect / visible)
//!                                    -> RemoteApi
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use fieldsync::engine::FieldSync;
//! use fieldsync::shared::AppConfig;
//!
//! # async fn example() -> Result<(), fieldsync::shared::SyncError> {
//! let engine = FieldSync::open_http(AppConfig::from_env()?).await?;
//! engine.start().await;
//!
//! let mut events = engine.sync().subscribe();
//! let pending = engine.sync().get_pending_count().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! Every service handle is cheap to clone and `Send + Sync`. The only mutual
//! exclusion in the engine is the sync processor's re-entrancy guard; local
//! records are whole-record overwrites, last writer wins.

/// Shared types and data structures
pub mod shared;

/// Local SQLite store
pub mod local_db;

/// Offline-first write path
pub mod offline;

/// Remote collaborators
pub mod remote;

/// Sync processor and connectivity
pub mod sync;

/// Application root
pub mod engine;

pub use engine::{CleanupOutcome, FieldSync};
