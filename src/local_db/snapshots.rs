//! # Entity Snapshot Storage
//!
//! One row per entity holding its full editable state as JSON. A save
//! replaces the whole row; there is no field-level versioning.

use crate::local_db::{format_timestamp, parse_timestamp, LocalDatabase, Result, StorageError};
use crate::shared::types::{EntitySnapshot, InspectionState};
use sqlx::Row;

impl LocalDatabase {
    /// Save an entity snapshot, replacing any previous one
    pub async fn save_snapshot(&self, snapshot: &EntitySnapshot) -> Result<()> {
        let data = serde_json::to_string(&snapshot.state)?;

        sqlx::query(
            "INSERT OR REPLACE INTO snapshots (entity_id, data, saved_at)
             VALUES (?, ?, ?)",
        )
        .bind(&snapshot.entity_id)
        .bind(data)
        .bind(format_timestamp(snapshot.saved_at))
        .execute(&self.pool)
        .await?;

        tracing::debug!(entity_id = %snapshot.entity_id, "snapshot saved");
        Ok(())
    }

    /// Load the last saved snapshot of an entity
    pub async fn load_snapshot(&self, entity_id: &str) -> Result<Option<EntitySnapshot>> {
        let row = sqlx::query("SELECT entity_id, data, saved_at FROM snapshots WHERE entity_id = ?")
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_snapshot(&row)?)),
            None => Ok(None),
        }
    }

    /// Delete an entity snapshot; deleting a missing snapshot is not an error
    pub async fn delete_snapshot(&self, entity_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM snapshots WHERE entity_id = ?")
            .bind(entity_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List the ids of every entity with a stored snapshot, most recent first
    pub async fn list_snapshots(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT entity_id FROM snapshots ORDER BY saved_at DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("entity_id").map_err(StorageError::from))
            .collect()
    }

    fn row_to_snapshot(row: &sqlx::sqlite::SqliteRow) -> Result<EntitySnapshot> {
        let entity_id: String = row.try_get("entity_id")?;
        let data: String = row.try_get("data")?;
        let saved_at: String = row.try_get("saved_at")?;

        let state: InspectionState = serde_json::from_str(&data)
            .map_err(|e| StorageError::corrupt(format!("snapshot/{entity_id}"), e.to_string()))?;

        Ok(EntitySnapshot {
            saved_at: parse_timestamp(&entity_id, &saved_at)?,
            entity_id,
            state,
        })
    }
}
