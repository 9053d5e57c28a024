//! Shared Module
//!
//! Types used by every layer of the engine: configuration, the umbrella
//! error type, sync events for the UI layer and the inspection domain model.

/// Application configuration
pub mod config;

/// Shared error types
pub mod error;

/// Sync events emitted to subscribers
pub mod event;

/// Inspection snapshot and catalog types
pub mod types;

/// Re-export commonly used types for convenience
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::SyncError;
pub use event::{SyncEvent, SyncSummary};
pub use types::{
    CatalogItem, CatalogRoom, EntityId, EntitySnapshot, InspectionState, ItemState, RoomState,
    ROOMS_KEY,
};
