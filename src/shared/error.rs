//! Shared Error Types
//!
//! This module defines the umbrella error type used by every component that
//! sits above the local store and the remote collaborators.
//!
//! # Error Categories
//!
//! - `Storage` - local store failures (quota, corruption, sqlite errors)
//! - `Remote` - remote endpoint failures (network, timeout, HTTP status)
//! - `Config` - invalid configuration
//! - `NotFound` - a record the caller asked for does not exist
//! - `Validation` - caller input that cannot be stored as given
//!
//! Storage errors are never retried automatically. They propagate to the
//! caller of the operation that hit them.
use thiserror::Error;

use crate::local_db::StorageError;
use crate::remote::RemoteError;
use crate::shared::config::ConfigError;

/// Errors surfaced by the gateway, the sync processor and the engine
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local store failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Remote collaborator failure
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Requested record does not exist
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind (snapshot, asset, queue item)
        kind: &'static str,
        /// Record identifier
        id: String,
    },

    /// Caller input rejected before anything was written
    #[error("Validation error in field '{field}': {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
}

impl SyncError {
    /// Create a new not-found error
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: &'static str, message: impl ToString) -> Self {
        Self::Validation {
            field,
            message: message.to_string(),
        }
    }

    /// Whether this error came from the local store
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Helper trait for converting serialization errors
impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(StorageError::from(err))
    }
}
