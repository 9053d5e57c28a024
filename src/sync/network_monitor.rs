//! # Connectivity Monitor
//!
//! Tracks whether the remote system is reachable by combining two sources:
//! the platform's connectivity signal, which can be stale, and an active
//! probe against the server.
//!
//! ## Rules
//!
//! - Either source reporting "down" marks the engine offline immediately
//! - Going back "up" always requires a successful probe
//! - Going offline sets a sticky `was_offline` flag that stays set until the
//!   UI acknowledges the reconnection
//!
//! Transitions are published on a `watch` channel so the sync processor can
//! react to reconnections.

use crate::remote::ConnectivityProbe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Online/offline tracker shared by the gateway and the sync processor
///
/// Cheap to clone; clones observe the same state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    probe: Arc<dyn ConnectivityProbe>,
    platform_online: AtomicBool,
    was_offline: AtomicBool,
    state: watch::Sender<bool>,
    probe_task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityMonitor {
    /// Create a monitor that starts offline until the first probe succeeds
    pub fn new(probe: Arc<dyn ConnectivityProbe>) -> Self {
        let (state, _) = watch::channel(false);
        Self {
            inner: Arc::new(MonitorInner {
                probe,
                platform_online: AtomicBool::new(true),
                was_offline: AtomicBool::new(false),
                state,
                probe_task: Mutex::new(None),
            }),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.inner.state.borrow()
    }

    /// Sticky flag set on every transition to offline
    pub fn was_offline(&self) -> bool {
        self.inner.was_offline.load(Ordering::SeqCst)
    }

    /// Clear `was_offline` once the UI has shown the reconnection
    ///
    /// Returns false while still offline; the flag is kept in that case.
    pub fn acknowledge_reconnection(&self) -> bool {
        if !self.is_online() {
            return false;
        }
        self.inner.was_offline.store(false, Ordering::SeqCst);
        true
    }

    /// Receive every online/offline transition
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.state.subscribe()
    }

    /// Feed the platform's connectivity signal
    pub async fn set_platform_status(&self, online: bool) {
        if online {
            self.inner.platform_online.store(true, Ordering::SeqCst);
            self.check_now().await;
        } else {
            self.report_offline();
        }
    }

    /// Platform reported the network down; takes effect immediately
    pub fn report_offline(&self) {
        self.inner.platform_online.store(false, Ordering::SeqCst);
        self.apply(false);
    }

    /// Run the active probe once and apply its result
    pub async fn check_now(&self) -> bool {
        let reachable = self.inner.probe.probe().await;
        let online = reachable && self.inner.platform_online.load(Ordering::SeqCst);
        self.apply(online);
        online
    }

    /// Probe periodically until [`stop_probing`](Self::stop_probing)
    pub async fn start_probing(&self, interval: Duration) {
        let mut task = self.inner.probe_task.lock().await;
        if task.is_some() {
            return;
        }

        let monitor = self.clone();
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.check_now().await;
            }
        }));
        tracing::debug!(?interval, "connectivity probing started");
    }

    pub async fn stop_probing(&self) {
        if let Some(task) = self.inner.probe_task.lock().await.take() {
            task.abort();
            tracing::debug!("connectivity probing stopped");
        }
    }

    fn apply(&self, online: bool) {
        let changed = self.inner.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if !changed {
            return;
        }
        if online {
            tracing::info!("connectivity restored");
        } else {
            self.inner.was_offline.store(true, Ordering::SeqCst);
            tracing::info!("connectivity lost");
        }
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .field("was_offline", &self.was_offline())
            .finish()
    }
}
