//! # Offline-First Write Path
//!
//! Every mutating operation goes through the [`WriteGateway`]. It persists
//! the intended effect locally first, then either applies it remotely right
//! away (online) or records it in the durable sync queue (offline or failed
//! attempt). A write therefore always leaves a confirmed remote effect or a
//! queued intent behind, and never waits on the network while offline.
//!
//! ## Key Components
//!
//! - `queue.rs`: durable sync queue with retry bookkeeping
//! - `retry.rs`: retryable vs terminal failure classification
//! - `apply.rs`: payload to remote endpoint dispatch
//! - `reconciliation.rs`: catalog/local merge on the read path
//! - `autosave.rs`: debounced snapshot writes
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use fieldsync::offline::WriteGateway;
//! # async fn example(gateway: WriteGateway) -> Result<(), fieldsync::shared::SyncError> {
//! let outcome = gateway
//!     .update_entity("entity-42", &serde_json::json!({"floor": 3}))
//!     .await?;
//! if outcome.is_offline() {
//!     // Show the "will sync later" badge
//! }
//! # Ok(())
//! # }
//! ```

pub mod apply;
pub mod autosave;
pub mod queue;
pub mod reconciliation;
pub mod retry;

pub use apply::{apply_payload, ApplyError};
pub use autosave::Autosaver;
pub use queue::{QueueListing, SyncQueue};
pub use reconciliation::{reconcile, Reconciler};
pub use retry::{Disposition, RetryPolicy};

use crate::local_db::{AssetMeta, LocalDatabase, QueueItemId, QueuePayload};
use crate::remote::{RemoteApi, RemoteError};
use crate::shared::error::SyncError;
use crate::shared::types::{EntitySnapshot, InspectionState, ROOMS_KEY};
use crate::sync::ConnectivityMonitor;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Result of a gateway write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The remote confirmed the mutation; nothing was queued
    Applied,
    /// The mutation is queued for the sync processor
    Queued { queue_item_id: QueueItemId },
}

impl WriteOutcome {
    /// Deferred result, shown to the user as "offline"
    pub fn is_offline(&self) -> bool {
        matches!(self, WriteOutcome::Queued { .. })
    }

    pub fn queue_item_id(&self) -> Option<QueueItemId> {
        match self {
            WriteOutcome::Applied => None,
            WriteOutcome::Queued { queue_item_id } => Some(*queue_item_id),
        }
    }
}

/// Result of capturing an asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUpload {
    pub asset: AssetMeta,
    /// `None` when the asset has no entity yet and stays local only
    pub outcome: Option<WriteOutcome>,
}

/// Single entry point for mutating operations
#[derive(Clone)]
pub struct WriteGateway {
    db: LocalDatabase,
    queue: SyncQueue,
    monitor: ConnectivityMonitor,
    remote: Arc<dyn RemoteApi>,
    request_timeout: Duration,
}

impl WriteGateway {
    pub fn new(
        db: LocalDatabase,
        queue: SyncQueue,
        monitor: ConnectivityMonitor,
        remote: Arc<dyn RemoteApi>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            db,
            queue,
            monitor,
            remote,
            request_timeout,
        }
    }

    /// Merge a partial update into the entity and send it
    ///
    /// A malformed `rooms` value is rejected before anything is written.
    pub async fn update_entity(
        &self,
        entity_id: &str,
        data: &Value,
    ) -> Result<WriteOutcome, SyncError> {
        let mut state = self.current_state(entity_id).await?;
        state
            .merge_fields(data)
            .map_err(|e| SyncError::validation(ROOMS_KEY, e))?;
        self.db
            .save_snapshot(&EntitySnapshot::new(entity_id, state))
            .await?;

        self.execute(QueuePayload::UpdateEntity {
            entity_id: entity_id.to_string(),
            data: data.clone(),
        })
        .await
    }

    /// Replace the entity snapshot and send it
    pub async fn save_inspection(
        &self,
        entity_id: &str,
        state: &InspectionState,
    ) -> Result<WriteOutcome, SyncError> {
        self.db
            .save_snapshot(&EntitySnapshot::new(entity_id, state.clone()))
            .await?;

        self.execute(QueuePayload::SaveInspection {
            entity_id: entity_id.to_string(),
            inspection_snapshot: state.clone(),
        })
        .await
    }

    /// Store a captured asset and upload it when it belongs to an entity
    ///
    /// The asset id is returned only after the bytes are committed locally.
    pub async fn upload_asset(
        &self,
        parent_room_id: i64,
        entity_id: Option<&str>,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<AssetUpload, SyncError> {
        let mut asset = self
            .db
            .save_asset(parent_room_id, entity_id, content_type, bytes)
            .await?;

        let Some(entity_id) = entity_id else {
            tracing::debug!(asset_id = %asset.id, "asset kept local, no entity yet");
            return Ok(AssetUpload {
                asset,
                outcome: None,
            });
        };

        let outcome = self
            .execute(QueuePayload::UploadAsset {
                asset_id: asset.id.clone(),
                parent_room_id,
                entity_id: entity_id.to_string(),
            })
            .await?;
        asset.synced = outcome == WriteOutcome::Applied;

        Ok(AssetUpload {
            asset,
            outcome: Some(outcome),
        })
    }

    /// Record offer data on the entity and send it
    pub async fn update_offer(
        &self,
        entity_id: &str,
        offer_data: &Value,
    ) -> Result<WriteOutcome, SyncError> {
        let mut state = self.current_state(entity_id).await?;
        state
            .fields
            .insert("offer".to_string(), offer_data.clone());
        self.db
            .save_snapshot(&EntitySnapshot::new(entity_id, state))
            .await?;

        self.execute(QueuePayload::UpdateOffer {
            entity_id: entity_id.to_string(),
            offer_data: offer_data.clone(),
        })
        .await
    }

    async fn current_state(&self, entity_id: &str) -> Result<InspectionState, SyncError> {
        Ok(self
            .db
            .load_snapshot(entity_id)
            .await?
            .map(|snapshot| snapshot.state)
            .unwrap_or_default())
    }

    /// Try the remote now when online, otherwise queue
    async fn execute(&self, payload: QueuePayload) -> Result<WriteOutcome, SyncError> {
        if !self.monitor.is_online() {
            return self.enqueue(&payload).await;
        }

        let attempt = tokio::time::timeout(
            self.request_timeout,
            apply_payload(self.remote.as_ref(), &self.db, &payload),
        )
        .await
        .unwrap_or(Err(ApplyError::Remote(RemoteError::Timeout(
            self.request_timeout,
        ))));

        match attempt {
            Ok(()) => {
                tracing::debug!(
                    item_type = %payload.item_type(),
                    entity_id = payload.entity_id(),
                    "mutation applied remotely"
                );
                Ok(WriteOutcome::Applied)
            }
            Err(ApplyError::Storage(e)) => Err(e.into()),
            Err(e) => {
                tracing::warn!(
                    item_type = %payload.item_type(),
                    entity_id = payload.entity_id(),
                    error = %e,
                    "remote write failed, queueing"
                );
                self.enqueue(&payload).await
            }
        }
    }

    async fn enqueue(&self, payload: &QueuePayload) -> Result<WriteOutcome, SyncError> {
        let queue_item_id = self.queue.enqueue(payload).await?;
        Ok(WriteOutcome::Queued { queue_item_id })
    }
}

impl std::fmt::Debug for WriteGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteGateway")
            .field("monitor", &self.monitor)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
