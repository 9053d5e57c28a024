//! # Engine Root
//!
//! [`FieldSync`] owns one instance of every component (local database, sync
//! queue, connectivity monitor, write gateway, sync processor, autosaver and
//! reconciler) and wires them together. The application constructs it once,
//! calls [`start`](FieldSync::start) and, on exit,
//! [`shutdown`](FieldSync::shutdown).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync::engine::FieldSync;
//! use fieldsync::shared::AppConfig;
//!
//! # async fn example() -> Result<(), fieldsync::shared::SyncError> {
//! let engine = FieldSync::open_http(AppConfig::from_env()?).await?;
//! engine.start().await;
//!
//! engine
//!     .gateway()
//!     .update_entity("entity-42", &serde_json::json!({"floor": 3}))
//!     .await?;
//!
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::local_db::LocalDatabase;
use crate::offline::{Autosaver, Reconciler, RetryPolicy, SyncQueue, WriteGateway};
use crate::remote::{ConnectivityProbe, HttpProbe, HttpRemote, RemoteApi};
use crate::shared::config::AppConfig;
use crate::shared::error::SyncError;
use crate::shared::types::EntitySnapshot;
use crate::sync::{ConnectivityMonitor, SyncService};
use std::sync::Arc;

/// Result of [`FieldSync::complete_workflow`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Local state of the entity was removed
    Cleared { assets_removed: u64 },
    /// Unsynced work remains; nothing was removed
    Retained { pending: usize, failed: usize },
}

/// Offline-first sync engine
#[derive(Debug)]
pub struct FieldSync {
    config: AppConfig,
    db: LocalDatabase,
    monitor: ConnectivityMonitor,
    gateway: WriteGateway,
    sync: SyncService,
    autosaver: Autosaver,
    reconciler: Reconciler,
}

impl FieldSync {
    /// Open the local database and build every component
    pub async fn open(
        config: AppConfig,
        remote: Arc<dyn RemoteApi>,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> Result<Self, SyncError> {
        config.validate()?;

        let db = LocalDatabase::open(&config.database_path).await?;
        let queue = SyncQueue::new(
            db.clone(),
            RetryPolicy::new(config.max_retries),
            config.retention_days,
        );
        let monitor = ConnectivityMonitor::new(probe);

        let gateway = WriteGateway::new(
            db.clone(),
            queue.clone(),
            monitor.clone(),
            remote.clone(),
            config.request_timeout,
        );
        let sync = SyncService::new(
            db.clone(),
            queue,
            monitor.clone(),
            remote.clone(),
            config.request_timeout,
        );
        let autosaver = Autosaver::spawn(db.clone(), config.autosave_quiet_period);
        let reconciler = Reconciler::new(db.clone(), remote, monitor.clone(), config.request_timeout);

        tracing::info!(
            database = %config.database_path.display(),
            server = %config.server_url,
            "engine opened"
        );

        Ok(Self {
            config,
            db,
            monitor,
            gateway,
            sync,
            autosaver,
            reconciler,
        })
    }

    /// Open the engine against the HTTP remote described by `config`
    pub async fn open_http(config: AppConfig) -> Result<Self, SyncError> {
        let remote = Arc::new(HttpRemote::new(config.clone())?);
        let probe = Arc::new(HttpProbe::new(&config)?);
        Self::open(config, remote, probe).await
    }

    /// Probe connectivity, run the start-up pass and start background work
    pub async fn start(&self) {
        self.monitor.check_now().await;
        self.monitor.start_probing(self.config.probe_interval).await;
        self.sync.start(self.config.sync_interval).await;
        tracing::info!(online = self.monitor.is_online(), "engine started");
    }

    /// Flush autosave and stop background work
    pub async fn shutdown(&self) {
        self.autosaver.shutdown().await;
        self.sync.stop_auto_sync().await;
        self.monitor.stop_probing().await;
        self.db.close().await;
        tracing::info!("engine stopped");
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn database(&self) -> &LocalDatabase {
        &self.db
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    pub fn gateway(&self) -> &WriteGateway {
        &self.gateway
    }

    pub fn sync(&self) -> &SyncService {
        &self.sync
    }

    pub fn autosaver(&self) -> &Autosaver {
        &self.autosaver
    }

    /// Reconcile an entity against the catalog for continued editing
    pub async fn load_for_editing(&self, entity_id: &str) -> Result<EntitySnapshot, SyncError> {
        self.reconciler.load_for_editing(entity_id).await
    }

    /// Clear local state of an entity whose workflow finished
    ///
    /// Nothing is removed while the entity still has pending or failed queue
    /// items; those stay for the next pass or for an operator.
    pub async fn complete_workflow(&self, entity_id: &str) -> Result<CleanupOutcome, SyncError> {
        self.autosaver.flush().await?;

        let counts = self.sync.queue().entity_stats(entity_id).await?;
        let (pending, failed) = (counts.pending, counts.failed);
        if pending > 0 || failed > 0 {
            tracing::warn!(entity_id, pending, failed, "workflow has unsynced work, keeping local state");
            return Ok(CleanupOutcome::Retained { pending, failed });
        }

        self.db.delete_snapshot(entity_id).await?;
        let assets_removed = self.db.delete_assets_for_entity(entity_id).await?;
        tracing::info!(entity_id, assets_removed, "workflow local state cleared");

        Ok(CleanupOutcome::Cleared { assets_removed })
    }
}
