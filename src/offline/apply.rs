//! Remote application of queue payloads
//!
//! The one place that maps a [`QueuePayload`] variant to its remote
//! endpoint. Both the write gateway (direct attempt while online) and the
//! sync processor (queue drain) go through [`apply_payload`].

use crate::local_db::{LocalDatabase, QueuePayload, StorageError};
use crate::remote::{RemoteApi, RemoteError};
use thiserror::Error;

/// Failure to apply one payload remotely
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The asset blob referenced by an upload is gone; the item can never succeed
    #[error("asset {0} is missing from the local store")]
    MissingAsset(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Apply one payload against the remote system
///
/// Asset uploads read the stored blob first and flip its `synced` flag once
/// the remote confirms.
pub async fn apply_payload(
    remote: &dyn RemoteApi,
    db: &LocalDatabase,
    payload: &QueuePayload,
) -> Result<(), ApplyError> {
    match payload {
        QueuePayload::UpdateEntity { entity_id, data } => {
            remote.update_entity(entity_id, data).await?;
        }
        QueuePayload::SaveInspection {
            entity_id,
            inspection_snapshot,
        } => {
            remote.save_inspection(entity_id, inspection_snapshot).await?;
        }
        QueuePayload::UploadAsset {
            asset_id,
            entity_id,
            ..
        } => {
            let blob = db
                .load_asset(asset_id)
                .await?
                .ok_or_else(|| ApplyError::MissingAsset(asset_id.clone()))?;
            remote.upload_asset(entity_id, &blob.meta, blob.bytes).await?;
            db.mark_asset_synced(asset_id).await?;
        }
        QueuePayload::UpdateOffer {
            entity_id,
            offer_data,
        } => {
            remote.update_offer(entity_id, offer_data).await?;
        }
    }
    Ok(())
}
