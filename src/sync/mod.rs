//! # Sync Processor
//!
//! Background service that drains the sync queue whenever the engine is
//! online and applies each queued mutation to the remote system.
//!
//! ## Architecture
//!
//! - **Sync Service**: one pass at a time, guarded against re-entrancy
//! - **Network Monitor**: online/offline tracking with an active probe
//! - **Events**: `syncStart` / `syncComplete` / `syncError` broadcast
//! - **Sync State**: snapshot of the engine for the UI layer
//! - **Metrics**: run and item counters
//!
//! ## Pass algorithm
//!
//! 1. Return immediately when offline or when a pass is already running
//! 2. Snapshot the pending items; items queued later wait for the next pass
//! 3. Apply each item in order; a failed item never aborts its siblings
//! 4. Stop early if connectivity drops, leaving the rest pending
//! 5. Emit `syncComplete` with the success/error counts
//!
//! ## Triggers
//!
//! Application start, a periodic timer (30s by default), every transition
//! back online and the UI becoming visible again.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use fieldsync::sync::SyncService;
//! # use std::time::Duration;
//! # async fn example(sync: SyncService) -> Result<(), fieldsync::shared::SyncError> {
//! let mut events = sync.subscribe();
//! sync.start_auto_sync(Duration::from_secs(30)).await;
//!
//! if let Some(summary) = sync.sync_all().await? {
//!     println!("{} of {} items synced", summary.success_count, summary.total);
//! }
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod metrics;
pub mod network_monitor;
pub mod sync_state;

pub use events::{broadcast_event, Subscription, SyncEventBroadcast};
pub use metrics::SyncMetrics;
pub use network_monitor::ConnectivityMonitor;
pub use sync_state::SyncStatus;

use crate::local_db::{LocalDatabase, StorageError, SyncQueueItem};
use crate::offline::{apply_payload, ApplyError, Disposition, SyncQueue};
use crate::remote::{RemoteApi, RemoteError};
use crate::shared::error::SyncError;
use crate::shared::event::{SyncEvent, SyncSummary};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;

/// Queue-draining sync service
///
/// Cheap to clone; clones drive the same service.
#[derive(Clone)]
pub struct SyncService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    db: LocalDatabase,
    queue: SyncQueue,
    monitor: ConnectivityMonitor,
    remote: Arc<dyn RemoteApi>,
    request_timeout: Duration,
    /// Set while a pass runs; the only re-entrancy guard in the engine
    syncing: AtomicBool,
    events: SyncEventBroadcast,
    metrics: RwLock<SyncMetrics>,
    visible: Notify,
    auto_sync: Mutex<Option<AutoSync>>,
}

struct AutoSync {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Per-item result inside a pass
enum ItemOutcome {
    Applied,
    Failed,
}

/// Resets the syncing flag when a pass ends, however it ends
struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncService {
    pub fn new(
        db: LocalDatabase,
        queue: SyncQueue,
        monitor: ConnectivityMonitor,
        remote: Arc<dyn RemoteApi>,
        request_timeout: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(events::EVENT_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(ServiceInner {
                db,
                queue,
                monitor,
                remote,
                request_timeout,
                syncing: AtomicBool::new(false),
                events,
                metrics: RwLock::new(SyncMetrics::new()),
                visible: Notify::new(),
                auto_sync: Mutex::new(None),
            }),
        }
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.inner.queue
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.inner.monitor
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::SeqCst)
    }

    /// Receive every sync event
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Call `callback` for every sync event until the subscription is dropped
    pub fn on_event<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        Subscription::spawn(self.inner.events.subscribe(), callback)
    }

    /// Run one pass over the pending queue
    ///
    /// Returns `None` without touching the queue when offline or when another
    /// pass is already running.
    pub async fn sync_all(&self) -> Result<Option<SyncSummary>, SyncError> {
        if !self.inner.monitor.is_online() {
            tracing::debug!("offline, skipping sync pass");
            return Ok(None);
        }

        if self
            .inner
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("sync pass already running");
            return Ok(None);
        }
        let _guard = SyncingGuard(&self.inner.syncing);

        broadcast_event(&self.inner.events, SyncEvent::SyncStart);
        self.inner.metrics.write().await.record_run_start();

        match self.run_pass().await {
            Ok(summary) => {
                self.inner.metrics.write().await.record_run_complete(&summary);
                tracing::info!(
                    success = summary.success_count,
                    errors = summary.error_count,
                    total = summary.total,
                    "sync pass complete"
                );
                broadcast_event(&self.inner.events, SyncEvent::SyncComplete(summary));
                Ok(Some(summary))
            }
            Err(e) => {
                self.inner.metrics.write().await.record_run_aborted();
                tracing::error!(error = %e, "sync pass aborted");
                broadcast_event(&self.inner.events, SyncEvent::error(&e));
                Err(e.into())
            }
        }
    }

    async fn run_pass(&self) -> Result<SyncSummary, StorageError> {
        let items = self.inner.queue.pending_items().await?;
        let mut summary = SyncSummary {
            total: items.len(),
            ..SyncSummary::default()
        };

        for item in items {
            if !self.inner.monitor.is_online() {
                tracing::info!(remaining = summary.skipped(), "connectivity lost mid-pass");
                break;
            }

            match self.process_item(&item).await? {
                ItemOutcome::Applied => summary.success_count += 1,
                ItemOutcome::Failed => summary.error_count += 1,
            }
        }

        self.inner.db.set_last_sync_time(Utc::now()).await?;
        Ok(summary)
    }

    async fn process_item(&self, item: &SyncQueueItem) -> Result<ItemOutcome, StorageError> {
        let queue = &self.inner.queue;

        let result = tokio::time::timeout(
            self.inner.request_timeout,
            apply_payload(self.inner.remote.as_ref(), &self.inner.db, &item.payload),
        )
        .await
        .unwrap_or(Err(ApplyError::Remote(RemoteError::Timeout(
            self.inner.request_timeout,
        ))));

        let error = match result {
            Ok(()) => {
                queue.mark_success(item.id).await?;
                tracing::debug!(
                    queue_item_id = item.id,
                    item_type = %item.item_type(),
                    "queue item applied"
                );
                return Ok(ItemOutcome::Applied);
            }
            Err(ApplyError::Storage(e)) => return Err(e),
            Err(e) => e,
        };

        let disposition = match &error {
            ApplyError::Remote(e) => queue.policy().classify(e),
            ApplyError::MissingAsset(_) | ApplyError::Storage(_) => Disposition::Terminal,
        };
        let message = error.to_string();
        match disposition {
            Disposition::Retry => {
                tracing::warn!(queue_item_id = item.id, error = %message, "queue item failed");
                queue.mark_failed(item.id, &message).await?;
            }
            Disposition::Terminal => {
                queue.mark_terminal(item.id, &message).await?;
            }
        }
        Ok(ItemOutcome::Failed)
    }

    /// Initial pass (when online) followed by the auto-sync loop
    pub async fn start(&self, interval: Duration) {
        if let Err(e) = self.sync_all().await {
            tracing::error!(error = %e, "initial sync failed");
        }
        self.start_auto_sync(interval).await;
    }

    /// Run passes on a timer, on reconnection and on visibility
    ///
    /// Runs the retention sweep once now and on every timer tick. Calling
    /// this while auto-sync is already running does nothing.
    pub async fn start_auto_sync(&self, interval: Duration) {
        let mut auto_sync = self.inner.auto_sync.lock().await;
        if auto_sync.is_some() {
            return;
        }

        self.sweep().await;

        let (stop, mut stop_rx) = watch::channel(false);
        let mut online = self.inner.monitor.subscribe();
        let service = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        service.sweep().await;
                        service.run_triggered("timer").await;
                    }
                    changed = online.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if *online.borrow_and_update() {
                            service.run_triggered("reconnected").await;
                        }
                    }
                    _ = service.inner.visible.notified() => {
                        service.run_triggered("visible").await;
                    }
                }
            }
        });

        *auto_sync = Some(AutoSync { stop, task });
        tracing::info!(?interval, "auto-sync started");
    }

    /// Stop the auto-sync loop; a pass in progress finishes first
    pub async fn stop_auto_sync(&self) {
        let Some(auto_sync) = self.inner.auto_sync.lock().await.take() else {
            return;
        };
        let _ = auto_sync.stop.send(true);
        if let Err(e) = auto_sync.task.await {
            tracing::warn!(error = %e, "auto-sync task ended abnormally");
        }
        tracing::info!("auto-sync stopped");
    }

    /// The UI became visible again
    pub fn notify_visible(&self) {
        self.inner.visible.notify_one();
    }

    pub async fn get_pending_count(&self) -> Result<usize, SyncError> {
        Ok(self.inner.queue.pending_count().await?)
    }

    /// Retention sweep over terminal queue items
    pub async fn cleanup(&self) -> Result<u64, SyncError> {
        Ok(self.inner.queue.cleanup().await?)
    }

    pub async fn status(&self) -> Result<SyncStatus, SyncError> {
        let counts = self.inner.queue.stats().await?;
        Ok(SyncStatus {
            is_syncing: self.is_syncing(),
            online: self.inner.monitor.is_online(),
            was_offline: self.inner.monitor.was_offline(),
            pending: counts.pending,
            failed: counts.failed,
            last_sync: self.inner.db.get_last_sync_time().await?,
        })
    }

    pub async fn metrics(&self) -> SyncMetrics {
        self.inner.metrics.read().await.clone()
    }

    async fn run_triggered(&self, trigger: &'static str) {
        tracing::debug!(trigger, "sync triggered");
        if let Err(e) = self.sync_all().await {
            tracing::error!(trigger, error = %e, "triggered sync failed");
        }
    }

    async fn sweep(&self) {
        if let Err(e) = self.inner.queue.cleanup().await {
            tracing::error!(error = %e, "retention sweep failed");
        }
    }
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("syncing", &self.is_syncing())
            .field("monitor", &self.inner.monitor)
            .finish_non_exhaustive()
    }
}
