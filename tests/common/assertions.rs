//! Queue and event assertions
//!
//! Helpers that read queue state back from the store and wait for sync
//! events with a deadline, so a hung pass fails the test instead of
//! blocking it.

use fieldsync::local_db::{QueueItemId, QueueStatus, SyncQueueItem};
use fieldsync::offline::SyncQueue;
use fieldsync::shared::{SyncEvent, SyncSummary};
use std::time::Duration;
use tokio::sync::broadcast;

/// Load a queue item and check its status and retry count
pub async fn assert_queue_item(
    queue: &SyncQueue,
    id: QueueItemId,
    status: QueueStatus,
    retry_count: u32,
) -> SyncQueueItem {
    let item = queue
        .get(id)
        .await
        .expect("Failed to read queue item")
        .unwrap_or_else(|| panic!("queue item {id} does not exist"));
    assert_eq!(item.status, status, "status of queue item {id}");
    assert_eq!(item.retry_count, retry_count, "retry count of queue item {id}");
    item
}

/// Wait for the next `syncComplete` event
pub async fn wait_for_complete(events: &mut broadcast::Receiver<SyncEvent>) -> SyncSummary {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match events.recv().await {
                Ok(SyncEvent::SyncComplete(summary)) => return summary,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("Timed out waiting for syncComplete")
}
