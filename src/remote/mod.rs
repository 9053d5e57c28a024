//! # Remote Collaborators
//!
//! The remote system of record is an opaque set of HTTP endpoints. The engine
//! only sees it through [`RemoteApi`] (mutation endpoints plus the reference
//! catalog) and [`ConnectivityProbe`] (lightweight reachability check), so
//! tests can swap in scripted implementations.
//!
//! ## Error classification
//!
//! | error | retryable |
//! |---|---|
//! | `Network`, `Timeout` | yes |
//! | `Http` 5xx, 408, 429 | yes |
//! | `Http` other 4xx | no |
//! | `Decode` | no |

mod http;

pub use http::{HttpProbe, HttpRemote};

use crate::local_db::AssetMeta;
use crate::shared::types::{CatalogRoom, InspectionState};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Remote call failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether retrying the same request can never succeed
    pub fn is_permanent(&self) -> bool {
        match self {
            RemoteError::Network(_) | RemoteError::Timeout(_) => false,
            RemoteError::Http { status, .. } => {
                (400..500).contains(status) && *status != 408 && *status != 429
            }
            RemoteError::Decode(_) => true,
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }
}

/// Remote system of record
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Apply a partial entity update
    async fn update_entity(&self, entity_id: &str, data: &Value) -> Result<(), RemoteError>;

    /// Store the full inspection snapshot of an entity
    async fn save_inspection(
        &self,
        entity_id: &str,
        snapshot: &InspectionState,
    ) -> Result<(), RemoteError>;

    /// Upload a captured asset
    async fn upload_asset(
        &self,
        entity_id: &str,
        meta: &AssetMeta,
        bytes: Bytes,
    ) -> Result<(), RemoteError>;

    /// Apply an offer update
    async fn update_offer(&self, entity_id: &str, offer_data: &Value) -> Result<(), RemoteError>;

    /// Read the canonical room/item catalog
    async fn fetch_catalog(&self) -> Result<Vec<CatalogRoom>, RemoteError>;
}

/// Active reachability check
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Returns true when the remote answered
    async fn probe(&self) -> bool;
}
