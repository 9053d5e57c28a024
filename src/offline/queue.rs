//! # Sync Queue
//!
//! Durable, ordered queue of mutations waiting to reach the remote system.
//! Every call writes through to the local database before returning, so the
//! queue survives process restarts as-is.
//!
//! ## Features
//!
//! - **Durable Enqueue**: succeeds regardless of connectivity
//! - **Insertion Order**: pending items come back in enqueue order
//! - **Retry Bookkeeping**: failures count toward a cap, then go terminal
//! - **Retention**: terminal items are purged after the retention window
//! - **Operator Queries**: failed items stay queryable and can be reset
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldsync::local_db::{LocalDatabase, QueuePayload};
//! use fieldsync::offline::{RetryPolicy, SyncQueue};
//!
//! # async fn example() -> fieldsync::local_db::Result<()> {
//! let db = LocalDatabase::open("/tmp/fieldsync/local.db").await?;
//! let queue = SyncQueue::new(db, RetryPolicy::default(), 7);
//!
//! let payload = QueuePayload::UpdateEntity {
//!     entity_id: "entity-42".to_string(),
//!     data: serde_json::json!({"floor": 3}),
//! };
//! let id = queue.enqueue(&payload).await?;
//!
//! for item in queue.pending_items().await? {
//!     // Apply remotely...
//!     queue.mark_success(item.id).await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::local_db::{
    LocalDatabase, QueueCounts, QueueItemId, QueuePayload, QueueRow, QueueStatus, Result,
    SyncQueueItem,
};
use crate::offline::retry::RetryPolicy;
use chrono::{TimeDelta, Utc};

/// Queue rows for an operator view
///
/// Rows whose payload no longer decodes are kept as stored instead of
/// failing the whole listing.
#[derive(Debug, Clone, Default)]
pub struct QueueListing {
    pub items: Vec<SyncQueueItem>,
    pub undecodable: Vec<QueueRow>,
}

impl QueueListing {
    fn from_rows(rows: Vec<QueueRow>) -> Self {
        let mut listing = Self::default();
        for row in rows {
            let raw = row.clone();
            match row.decode() {
                Ok(item) => listing.items.push(item),
                Err(e) => {
                    tracing::warn!(queue_item_id = raw.id, error = %e, "listing undecodable queue item");
                    listing.undecodable.push(raw);
                }
            }
        }
        listing
    }

    /// Number of rows, decoded or not
    pub fn len(&self) -> usize {
        self.items.len() + self.undecodable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Persistent sync queue
#[derive(Debug, Clone)]
pub struct SyncQueue {
    db: LocalDatabase,
    policy: RetryPolicy,
    retention_days: i64,
}

impl SyncQueue {
    /// Create a queue over the local database
    pub fn new(db: LocalDatabase, policy: RetryPolicy, retention_days: i64) -> Self {
        Self {
            db,
            policy,
            retention_days,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Append a mutation; the item is durable once this returns
    pub async fn enqueue(&self, payload: &QueuePayload) -> Result<QueueItemId> {
        let id = self
            .db
            .insert_queue_item(payload, Some(payload.entity_id()))
            .await?;

        tracing::debug!(
            queue_item_id = id,
            item_type = %payload.item_type(),
            entity_id = payload.entity_id(),
            "mutation queued"
        );
        Ok(id)
    }

    /// All pending items in insertion order
    ///
    /// Rows whose payload can no longer be decoded are moved to `failed`
    /// instead of being skipped, so they stay visible to operators.
    pub async fn pending_items(&self) -> Result<Vec<SyncQueueItem>> {
        let rows = self.db.queue_rows_by_status(QueueStatus::Pending).await?;
        let mut items = Vec::with_capacity(rows.len());

        for row in rows {
            let id = row.id;
            match row.decode() {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::error!(queue_item_id = id, error = %e, "undecodable queue item");
                    self.mark_terminal(id, &e.to_string()).await?;
                }
            }
        }

        Ok(items)
    }

    /// Record a confirmed remote application
    pub async fn mark_success(&self, id: QueueItemId) -> Result<()> {
        if !self.db.complete_queue_item(id).await? {
            tracing::warn!(queue_item_id = id, "completed item was not pending");
        }
        Ok(())
    }

    /// Record a retryable failure
    ///
    /// Returns the resulting status, or `None` when the item was not pending.
    pub async fn mark_failed(&self, id: QueueItemId, error: &str) -> Result<Option<QueueStatus>> {
        if !self
            .db
            .record_queue_failure(id, error, self.policy.max_retries())
            .await?
        {
            tracing::warn!(queue_item_id = id, "failed item was not pending");
            return Ok(None);
        }

        let status = self.status_of(id).await?;
        if status == Some(QueueStatus::Failed) {
            tracing::error!(queue_item_id = id, error, "queue item exhausted its retries");
        }
        Ok(status)
    }

    /// Move an item straight to `failed`; it can never succeed as-is
    pub async fn mark_terminal(&self, id: QueueItemId, error: &str) -> Result<()> {
        if self
            .db
            .fail_queue_item_permanently(id, error, self.policy.max_retries())
            .await?
        {
            tracing::error!(queue_item_id = id, error, "queue item failed permanently");
        }
        Ok(())
    }

    /// Delete terminal items older than the retention window
    pub async fn cleanup(&self) -> Result<u64> {
        let cutoff = TimeDelta::try_days(self.retention_days)
            .and_then(|window| Utc::now().checked_sub_signed(window));
        let Some(cutoff) = cutoff else {
            tracing::warn!(
                retention_days = self.retention_days,
                "retention window out of range, nothing to sweep"
            );
            return Ok(0);
        };

        let removed = self.db.delete_finished_queue_items(cutoff).await?;
        if removed > 0 {
            tracing::info!(removed, "retention sweep removed finished queue items");
        }
        Ok(removed)
    }

    pub async fn pending_count(&self) -> Result<usize> {
        self.db.count_pending_queue_items().await
    }

    /// Look up one item in any status
    pub async fn get(&self, id: QueueItemId) -> Result<Option<SyncQueueItem>> {
        self.db
            .get_queue_row(id)
            .await?
            .map(|row| row.decode())
            .transpose()
    }

    /// Items that exhausted their retries or failed permanently
    pub async fn failed_items(&self) -> Result<QueueListing> {
        let rows = self.db.queue_rows_by_status(QueueStatus::Failed).await?;
        Ok(QueueListing::from_rows(rows))
    }

    /// Every item of one entity, in insertion order
    pub async fn items_for_entity(&self, entity_id: &str) -> Result<QueueListing> {
        let rows = self.db.queue_rows_for_entity(entity_id).await?;
        Ok(QueueListing::from_rows(rows))
    }

    /// Counts per status for one entity
    pub async fn entity_stats(&self, entity_id: &str) -> Result<QueueCounts> {
        self.db.queue_counts_for_entity(entity_id).await
    }

    /// Counts per status
    pub async fn stats(&self) -> Result<QueueCounts> {
        self.db.queue_counts().await
    }

    /// Operator reset of a failed item back to `pending`
    pub async fn retry_failed(&self, id: QueueItemId) -> Result<bool> {
        let reset = self.db.reset_failed_queue_item(id).await?;
        if reset {
            tracing::info!(queue_item_id = id, "failed item reset for retry");
        }
        Ok(reset)
    }

    async fn status_of(&self, id: QueueItemId) -> Result<Option<QueueStatus>> {
        Ok(self
            .db
            .get_queue_row(id)
            .await?
            .and_then(|row| row.status.parse::<QueueStatus>().ok()))
    }
}
