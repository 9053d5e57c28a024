//! # Retry Policy
//!
//! Decides what a failed queue item attempt means for the item. Retries are
//! not scheduled per item: every sync pass rescans the whole pending queue,
//! so the policy only has to answer "try again next pass" or "give up now".
//!
//! ## Rules
//!
//! - **Retry**: network failures, timeouts, HTTP 5xx, 408 and 429
//! - **Terminal**: any other HTTP 4xx, undecodable responses, queue rows
//!   whose payload cannot be decoded and assets whose blob is gone
//! - **Max Retries**: a retryable item becomes terminal after the cap

use crate::remote::RemoteError;
use crate::shared::config::DEFAULT_MAX_RETRIES;

/// Outcome of classifying one failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep the item pending for the next pass
    Retry,
    /// Move the item to `failed` now
    Terminal,
}

/// Retry policy shared by the gateway and the sync processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    /// Create a policy with the given failure cap (at least one)
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Classify a remote failure
    pub fn classify(&self, error: &RemoteError) -> Disposition {
        if error.is_permanent() {
            Disposition::Terminal
        } else {
            Disposition::Retry
        }
    }

    /// Whether an item with this many recorded failures is exhausted
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }
}
