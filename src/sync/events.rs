/**
 * Sync Event Broadcasting
 *
 * Events from the sync processor are fanned out through a
 * `tokio::sync::broadcast` channel. Consumers either hold a receiver
 * (`SyncService::subscribe`) or register a callback (`SyncService::on_event`)
 * and keep the returned `Subscription` for as long as they want events.
 */
use crate::shared::event::SyncEvent;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Sync event broadcast channel
pub type SyncEventBroadcast = broadcast::Sender<SyncEvent>;

/// Capacity of the event channel; slow subscribers lose the oldest events
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Broadcast an event to every subscriber
///
/// Returns the number of subscribers that received it (0 if none).
pub fn broadcast_event(events: &SyncEventBroadcast, event: SyncEvent) -> usize {
    match events.send(event) {
        Ok(subscriber_count) => subscriber_count,
        Err(_) => 0,
    }
}

/// Registered event callback
///
/// The callback stays attached until [`unsubscribe`](Self::unsubscribe) is
/// called or the guard is dropped.
#[derive(Debug)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn spawn<F>(mut receiver: broadcast::Receiver<SyncEvent>, callback: F) -> Self
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => callback(&event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "event subscriber fell behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self { task: Some(task) }
    }

    /// Detach the callback
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
