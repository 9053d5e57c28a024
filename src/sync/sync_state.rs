//! # Sync State
//!
//! Point-in-time view of the engine for the UI layer: whether a pass is
//! running, connectivity, and how much work is still outstanding.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub online: bool,
    /// Sticky flag, see `ConnectivityMonitor::was_offline`
    pub was_offline: bool,
    pub pending: usize,
    pub failed: usize,
    pub last_sync: Option<DateTime<Utc>>,
}

impl SyncStatus {
    /// Nothing left to send and nothing needing an operator
    pub fn is_settled(&self) -> bool {
        self.pending == 0 && self.failed == 0 && !self.is_syncing
    }
}
