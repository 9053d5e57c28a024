//! # Sync Queue Rows and Sync Metadata
//!
//! Durable storage for the sync queue and the small key/value table that
//! tracks synchronization state. Policy (retry cap, retention window,
//! terminal classification) lives in `offline::queue`; this module only
//! knows how to read and write rows.
//!
//! ## Row lifecycle
//!
//! ```text
//! pending --(success)--> completed
//! pending --(failure, retry_count + 1 < cap)--> pending
//! pending --(failure, retry_count + 1 >= cap)--> failed
//! failed  --(operator reset)--> pending
//! completed | failed --(retention sweep)--> deleted
//! ```

use crate::local_db::{format_timestamp, parse_timestamp, LocalDatabase, Result, StorageError};
use crate::shared::types::InspectionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

/// Queue item identifier, assigned monotonically by SQLite
pub type QueueItemId = i64;

/// Mutation recorded in the queue, with its payload captured at enqueue time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all_fields = "camelCase")]
pub enum QueuePayload {
    UpdateEntity {
        entity_id: String,
        data: Value,
    },
    SaveInspection {
        entity_id: String,
        inspection_snapshot: InspectionState,
    },
    UploadAsset {
        asset_id: String,
        parent_room_id: i64,
        entity_id: String,
    },
    UpdateOffer {
        entity_id: String,
        offer_data: Value,
    },
}

impl QueuePayload {
    pub fn item_type(&self) -> QueueItemType {
        match self {
            QueuePayload::UpdateEntity { .. } => QueueItemType::UpdateEntity,
            QueuePayload::SaveInspection { .. } => QueueItemType::SaveInspection,
            QueuePayload::UploadAsset { .. } => QueueItemType::UploadAsset,
            QueuePayload::UpdateOffer { .. } => QueueItemType::UpdateOffer,
        }
    }

    /// Entity the mutation belongs to
    pub fn entity_id(&self) -> &str {
        match self {
            QueuePayload::UpdateEntity { entity_id, .. }
            | QueuePayload::SaveInspection { entity_id, .. }
            | QueuePayload::UploadAsset { entity_id, .. }
            | QueuePayload::UpdateOffer { entity_id, .. } => entity_id,
        }
    }
}

/// Kind of queued mutation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum QueueItemType {
    UpdateEntity,
    SaveInspection,
    UploadAsset,
    UpdateOffer,
}

impl QueueItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueItemType::UpdateEntity => "UpdateEntity",
            QueueItemType::SaveInspection => "SaveInspection",
            QueueItemType::UploadAsset => "UploadAsset",
            QueueItemType::UpdateOffer => "UpdateOffer",
        }
    }
}

impl fmt::Display for QueueItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue item status; `Completed` and `Failed` are terminal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Completed,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, QueueStatus::Pending)
    }
}

impl FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "completed" => Ok(QueueStatus::Completed),
            "failed" => Ok(QueueStatus::Failed),
            other => Err(format!("unknown queue status {other:?}")),
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded sync queue row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    pub id: QueueItemId,
    pub payload: QueuePayload,
    pub related_entity_id: Option<String>,
    pub status: QueueStatus,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Time the item reached a terminal status
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SyncQueueItem {
    pub fn item_type(&self) -> QueueItemType {
        self.payload.item_type()
    }
}

/// Sync queue row as stored, before payload decoding
#[derive(Debug, Clone)]
pub struct QueueRow {
    pub id: QueueItemId,
    pub item_type: String,
    pub payload: String,
    pub related_entity_id: Option<String>,
    pub status: String,
    pub retry_count: i64,
    pub created_at: String,
    pub last_attempt_at: Option<String>,
    pub finished_at: Option<String>,
    pub last_error: Option<String>,
}

impl QueueRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            item_type: row.try_get("item_type")?,
            payload: row.try_get("payload")?,
            related_entity_id: row.try_get("related_entity_id")?,
            status: row.try_get("status")?,
            retry_count: row.try_get("retry_count")?,
            created_at: row.try_get("created_at")?,
            last_attempt_at: row.try_get("last_attempt_at")?,
            finished_at: row.try_get("finished_at")?,
            last_error: row.try_get("last_error")?,
        })
    }

    /// Decode the stored payload and timestamps
    pub fn decode(self) -> Result<SyncQueueItem> {
        let key = format!("sync_queue/{}", self.id);

        let payload: QueuePayload = serde_json::from_str(&self.payload)
            .map_err(|e| StorageError::corrupt(&key, e.to_string()))?;
        if payload.item_type().as_str() != self.item_type {
            return Err(StorageError::corrupt(
                &key,
                format!("type column {} does not match payload {}", self.item_type, payload.item_type()),
            ));
        }
        let status = self
            .status
            .parse::<QueueStatus>()
            .map_err(|e| StorageError::corrupt(&key, e))?;

        let parse_optional = |raw: Option<String>| -> Result<Option<DateTime<Utc>>> {
            raw.map(|raw| parse_timestamp(&key, &raw)).transpose()
        };

        Ok(SyncQueueItem {
            id: self.id,
            payload,
            related_entity_id: self.related_entity_id,
            status,
            retry_count: self.retry_count.max(0) as u32,
            created_at: parse_timestamp(&key, &self.created_at)?,
            last_attempt_at: parse_optional(self.last_attempt_at)?,
            finished_at: parse_optional(self.finished_at)?,
            last_error: self.last_error,
        })
    }
}

/// Row counts per queue status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
}

const QUEUE_COLUMNS: &str = "id, item_type, payload, related_entity_id, status, retry_count,
     created_at, last_attempt_at, finished_at, last_error";

impl LocalDatabase {
    /// Append a mutation to the sync queue and return its id
    pub async fn insert_queue_item(
        &self,
        payload: &QueuePayload,
        related_entity_id: Option<&str>,
    ) -> Result<QueueItemId> {
        let data = serde_json::to_string(payload)?;

        let result = sqlx::query(
            "INSERT INTO sync_queue (item_type, payload, related_entity_id, status, retry_count, created_at)
             VALUES (?, ?, ?, 'pending', 0, ?)",
        )
        .bind(payload.item_type().as_str())
        .bind(data)
        .bind(related_entity_id)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Queue rows with the given status in insertion order
    pub async fn queue_rows_by_status(&self, status: QueueStatus) -> Result<Vec<QueueRow>> {
        let query = format!("SELECT {QUEUE_COLUMNS} FROM sync_queue WHERE status = ? ORDER BY id ASC");
        let rows = sqlx::query(&query)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(QueueRow::from_row).collect()
    }

    /// Queue rows of one entity in insertion order
    pub async fn queue_rows_for_entity(&self, entity_id: &str) -> Result<Vec<QueueRow>> {
        let query = format!(
            "SELECT {QUEUE_COLUMNS} FROM sync_queue WHERE related_entity_id = ? ORDER BY id ASC"
        );
        let rows = sqlx::query(&query)
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(QueueRow::from_row).collect()
    }

    pub async fn get_queue_row(&self, id: QueueItemId) -> Result<Option<QueueRow>> {
        let query = format!("SELECT {QUEUE_COLUMNS} FROM sync_queue WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(QueueRow::from_row).transpose()
    }

    /// Mark a pending item as completed
    ///
    /// Returns false when the item is missing or already terminal.
    pub async fn complete_queue_item(&self, id: QueueItemId) -> Result<bool> {
        let now = format_timestamp(Utc::now());
        let result = sqlx::query(
            "UPDATE sync_queue SET status = 'completed', last_attempt_at = ?, finished_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record one failed attempt of a pending item
    ///
    /// The item becomes `failed` once its retry count reaches `max_retries`.
    pub async fn record_queue_failure(
        &self,
        id: QueueItemId,
        error: &str,
        max_retries: u32,
    ) -> Result<bool> {
        let now = format_timestamp(Utc::now());
        let result = sqlx::query(
            "UPDATE sync_queue SET
                retry_count = retry_count + 1,
                last_attempt_at = ?,
                last_error = ?,
                status = CASE WHEN retry_count + 1 >= ? THEN 'failed' ELSE 'pending' END,
                finished_at = CASE WHEN retry_count + 1 >= ? THEN ? ELSE NULL END
             WHERE id = ? AND status = 'pending'",
        )
        .bind(&now)
        .bind(error)
        .bind(max_retries as i64)
        .bind(max_retries as i64)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a pending item straight to `failed`
    ///
    /// The retry count is raised to at least `max_retries` so a failed item
    /// always carries an exhausted count.
    pub async fn fail_queue_item_permanently(
        &self,
        id: QueueItemId,
        error: &str,
        max_retries: u32,
    ) -> Result<bool> {
        let now = format_timestamp(Utc::now());
        let result = sqlx::query(
            "UPDATE sync_queue SET
                retry_count = MAX(retry_count + 1, ?),
                last_attempt_at = ?,
                last_error = ?,
                status = 'failed',
                finished_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(max_retries as i64)
        .bind(&now)
        .bind(error)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Put a failed item back to `pending` with a fresh retry budget
    pub async fn reset_failed_queue_item(&self, id: QueueItemId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE sync_queue SET status = 'pending', retry_count = 0, finished_at = NULL
             WHERE id = ? AND status = 'failed'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete terminal items that finished before `cutoff`
    pub async fn delete_finished_queue_items(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM sync_queue
             WHERE status IN ('completed', 'failed') AND finished_at < ?",
        )
        .bind(format_timestamp(cutoff))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Count rows per status
    pub async fn queue_counts(&self) -> Result<QueueCounts> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS total FROM sync_queue GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        count_by_status(&rows)
    }

    /// Count rows per status for one entity, whether or not their payload decodes
    pub async fn queue_counts_for_entity(&self, entity_id: &str) -> Result<QueueCounts> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS total FROM sync_queue
             WHERE related_entity_id = ? GROUP BY status",
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        count_by_status(&rows)
    }

    /// Count pending rows
    pub async fn count_pending_queue_items(&self) -> Result<usize> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sync_queue WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 as usize)
    }

    /// Set sync metadata
    pub async fn set_sync_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_metadata (key, value, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get sync metadata
    pub async fn get_sync_metadata(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM sync_metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    /// Get last successful sync timestamp
    pub async fn get_last_sync_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.get_sync_metadata("last_sync_time")
            .await?
            .map(|raw| parse_timestamp("sync_metadata/last_sync_time", &raw))
            .transpose()
    }

    /// Stamp the last successful sync timestamp
    pub async fn set_last_sync_time(&self, at: DateTime<Utc>) -> Result<()> {
        self.set_sync_metadata("last_sync_time", &format_timestamp(at))
            .await
    }
}

fn count_by_status(rows: &[sqlx::sqlite::SqliteRow]) -> Result<QueueCounts> {
    let mut counts = QueueCounts::default();
    for row in rows {
        let status: String = row.try_get("status")?;
        let total: i64 = row.try_get("total")?;
        match status.parse::<QueueStatus>() {
            Ok(QueueStatus::Pending) => counts.pending = total as usize,
            Ok(QueueStatus::Completed) => counts.completed = total as usize,
            Ok(QueueStatus::Failed) => counts.failed = total as usize,
            Err(e) => tracing::warn!(error = %e, "ignoring unknown queue status in counts"),
        }
    }
    Ok(counts)
}
