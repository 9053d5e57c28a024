//! # Sync Metrics
//!
//! Counters over the lifetime of one sync service: passes run, items applied
//! and failed, and a rolling average pass duration.

use crate::shared::event::SyncSummary;
use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncMetrics {
    pub total_runs: u64,
    pub aborted_runs: u64,
    pub items_applied: u64,
    pub items_failed: u64,
    pub average_run_duration: Duration,
    pub last_run_duration: Option<Duration>,
    #[serde(skip)]
    last_run_start: Option<Instant>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_run_start(&mut self) {
        self.last_run_start = Some(Instant::now());
        self.total_runs += 1;
    }

    pub fn record_run_complete(&mut self, summary: &SyncSummary) {
        self.items_applied += summary.success_count as u64;
        self.items_failed += summary.error_count as u64;

        if let Some(start) = self.last_run_start.take() {
            let duration = start.elapsed();
            self.last_run_duration = Some(duration);

            // Rolling average over completed runs
            let completed = (self.total_runs - self.aborted_runs).max(1) as u32;
            let total_duration = self.average_run_duration * (completed - 1) + duration;
            self.average_run_duration = total_duration / completed;
        }
    }

    /// A run that stopped on a storage error
    pub fn record_run_aborted(&mut self) {
        self.last_run_start = None;
        self.aborted_runs += 1;
    }

    pub fn success_rate(&self) -> f64 {
        let attempted = self.items_applied + self.items_failed;
        if attempted == 0 {
            0.0
        } else {
            self.items_applied as f64 / attempted as f64
        }
    }
}
