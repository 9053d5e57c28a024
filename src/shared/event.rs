/**
 * Sync Event System
 *
 * Events emitted by the sync processor to the UI layer. Subscribers receive
 * every event through a `tokio::sync::broadcast` channel; a subscriber that
 * falls behind loses the oldest events, never blocks the processor.
 */
use serde::{Deserialize, Serialize};

/// Aggregate result of one sync pass
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    /// Items whose remote application was confirmed
    pub success_count: usize,
    /// Items whose remote application failed during this pass
    pub error_count: usize,
    /// Items in the snapshot taken at the start of the pass
    pub total: usize,
}

impl SyncSummary {
    /// Items left untouched because connectivity dropped mid-run
    pub fn skipped(&self) -> usize {
        self.total
            .saturating_sub(self.success_count + self.error_count)
    }
}

/// Event emitted by the sync processor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SyncEvent {
    /// A sync pass started
    SyncStart,
    /// A sync pass finished evaluating its snapshot
    SyncComplete(SyncSummary),
    /// A sync pass could not run (e.g. the queue could not be read)
    SyncError {
        /// Human-readable error message
        error: String,
    },
}

impl SyncEvent {
    /// Create an error event
    pub fn error(error: impl ToString) -> Self {
        Self::SyncError {
            error: error.to_string(),
        }
    }
}
