//! # Asset Blob Storage
//!
//! Captured binary assets (photos of rooms, damage, ...) stored as raw bytes
//! keyed by id, with metadata in separate columns so listing assets never
//! reads the payload.

use crate::local_db::{format_timestamp, parse_timestamp, LocalDatabase, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

/// Asset metadata without the payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssetMeta {
    pub id: String,
    pub parent_room_id: i64,
    pub related_entity_id: Option<String>,
    pub content_type: String,
    pub size: u64,
    /// Flipped once the remote upload is confirmed
    pub synced: bool,
    pub created_at: DateTime<Utc>,
}

/// Asset metadata together with its bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBlob {
    pub meta: AssetMeta,
    pub bytes: Bytes,
}

const META_COLUMNS: &str =
    "id, parent_room_id, related_entity_id, content_type, LENGTH(bytes) AS size, synced, created_at";

impl LocalDatabase {
    /// Store a captured asset and return its metadata
    ///
    /// The returned id refers to bytes that are already committed.
    pub async fn save_asset(
        &self,
        parent_room_id: i64,
        related_entity_id: Option<&str>,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<AssetMeta> {
        let meta = AssetMeta {
            id: Uuid::new_v4().to_string(),
            parent_room_id,
            related_entity_id: related_entity_id.map(str::to_string),
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
            synced: false,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO assets (id, parent_room_id, related_entity_id, content_type, bytes, synced, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&meta.id)
        .bind(meta.parent_room_id)
        .bind(&meta.related_entity_id)
        .bind(&meta.content_type)
        .bind(bytes)
        .bind(format_timestamp(meta.created_at))
        .execute(&self.pool)
        .await?;

        tracing::debug!(asset_id = %meta.id, size = meta.size, "asset stored");
        Ok(meta)
    }

    /// Load an asset with its bytes
    pub async fn load_asset(&self, asset_id: &str) -> Result<Option<AssetBlob>> {
        let query = format!("SELECT {META_COLUMNS}, bytes FROM assets WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(asset_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let meta = Self::row_to_asset_meta(&row)?;
                let bytes: Vec<u8> = row.try_get("bytes")?;
                Ok(Some(AssetBlob {
                    meta,
                    bytes: Bytes::from(bytes),
                }))
            }
            None => Ok(None),
        }
    }

    /// Record a confirmed remote upload
    pub async fn mark_asset_synced(&self, asset_id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE assets SET synced = 1 WHERE id = ?")
            .bind(asset_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Metadata of every asset attached to an entity, oldest first
    pub async fn assets_for_entity(&self, entity_id: &str) -> Result<Vec<AssetMeta>> {
        let query = format!(
            "SELECT {META_COLUMNS} FROM assets WHERE related_entity_id = ? ORDER BY created_at ASC"
        );
        let rows = sqlx::query(&query)
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_asset_meta).collect()
    }

    /// Delete every asset attached to an entity
    pub async fn delete_assets_for_entity(&self, entity_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM assets WHERE related_entity_id = ?")
            .bind(entity_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    fn row_to_asset_meta(row: &sqlx::sqlite::SqliteRow) -> Result<AssetMeta> {
        let id: String = row.try_get("id")?;
        let created_at: String = row.try_get("created_at")?;
        let size: i64 = row.try_get("size")?;

        Ok(AssetMeta {
            created_at: parse_timestamp(&id, &created_at)?,
            parent_room_id: row.try_get("parent_room_id")?,
            related_entity_id: row.try_get("related_entity_id")?,
            content_type: row.try_get("content_type")?,
            size: size.max(0) as u64,
            synced: row.try_get("synced")?,
            id,
        })
    }
}
