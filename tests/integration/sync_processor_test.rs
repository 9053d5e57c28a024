//! Sync processor tests
//!
//! Queue draining, retry cap, partial-batch resilience, mid-run disconnect,
//! re-entrancy and triggers.

use crate::common::*;
use futures_util::future::join;
use fieldsync::local_db::{QueuePayload, QueueStatus};
use fieldsync::remote::RemoteError;
use fieldsync::shared::{SyncEvent, SyncSummary};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

async fn queue_steps(test: &TestEngine, steps: &[&str]) -> Vec<i64> {
    let mut ids = Vec::new();
    for step in steps {
        let outcome = test
            .engine
            .gateway()
            .update_entity("entity-1", &json!({ "step": step }))
            .await
            .unwrap();
        ids.push(outcome.queue_item_id().expect("offline write should queue"));
    }
    ids
}

fn is_step(call: &RemoteCall, step: &str) -> bool {
    matches!(call, RemoteCall::UpdateEntity { data, .. } if data["step"] == step)
}

#[tokio::test]
async fn test_sync_applies_captured_payloads_once() {
    let test = offline_engine().await;
    let gateway = test.engine.gateway();
    gateway
        .update_entity("entity-1", &json!({"floor": 1}))
        .await
        .unwrap();
    gateway
        .update_offer("entity-1", &json!({"total": 10}))
        .await
        .unwrap();
    // Later local edits must not change what was captured
    gateway
        .update_entity("entity-1", &json!({"floor": 9}))
        .await
        .unwrap();

    test.go_online().await;
    let summary = test.engine.sync().sync_all().await.unwrap().unwrap();
    assert_eq!(
        summary,
        SyncSummary {
            success_count: 3,
            error_count: 0,
            total: 3
        }
    );
    assert_eq!(
        test.remote.calls(),
        vec![
            RemoteCall::UpdateEntity {
                entity_id: "entity-1".to_string(),
                data: json!({"floor": 1}),
            },
            RemoteCall::UpdateOffer {
                entity_id: "entity-1".to_string(),
                offer_data: json!({"total": 10}),
            },
            RemoteCall::UpdateEntity {
                entity_id: "entity-1".to_string(),
                data: json!({"floor": 9}),
            },
        ]
    );

    // Completed items are never applied again
    let second = test.engine.sync().sync_all().await.unwrap().unwrap();
    assert_eq!(second.total, 0);
    assert_eq!(test.remote.call_count(), 3);
}

#[tokio::test]
async fn test_offline_sync_is_noop() {
    let test = offline_engine().await;
    queue_steps(&test, &["A"]).await;

    assert_eq!(test.engine.sync().sync_all().await.unwrap(), None);
    assert_eq!(test.remote.call_count(), 0);
    assert_eq!(test.engine.sync().get_pending_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_retry_cap_reaches_failed_after_five_attempts() {
    let test = offline_engine().await;
    let ids = queue_steps(&test, &["A"]).await;
    test.remote.fail_all(RemoteError::http(503, "unavailable"));
    test.go_online().await;

    for attempt in 1..=4 {
        test.engine.sync().sync_all().await.unwrap();
        assert_queue_item(test.engine.sync().queue(), ids[0], QueueStatus::Pending, attempt).await;
    }
    test.engine.sync().sync_all().await.unwrap();
    let item = assert_queue_item(test.engine.sync().queue(), ids[0], QueueStatus::Failed, 5).await;
    assert!(item.last_error.unwrap().contains("503"));

    // Terminal: never attempted a sixth time
    test.engine.sync().sync_all().await.unwrap();
    test.engine.sync().sync_all().await.unwrap();
    assert_eq!(test.remote.call_count(), 5);
    assert_eq!(test.engine.sync().queue().failed_items().await.unwrap().items.len(), 1);
}

#[tokio::test]
async fn test_partial_batch_resilience() {
    let test = offline_engine().await;
    let ids = queue_steps(&test, &["A", "B", "C"]).await;
    test.remote.script(|call| {
        if is_step(call, "B") {
            Behavior::Fail(RemoteError::Network("connection reset".to_string()))
        } else {
            Behavior::Succeed
        }
    });
    test.go_online().await;

    let summary = test.engine.sync().sync_all().await.unwrap().unwrap();
    assert_eq!((summary.success_count, summary.error_count, summary.total), (2, 1, 3));

    let queue = test.engine.sync().queue();
    assert_queue_item(queue, ids[0], QueueStatus::Completed, 0).await;
    assert_queue_item(queue, ids[1], QueueStatus::Pending, 1).await;
    assert_queue_item(queue, ids[2], QueueStatus::Completed, 0).await;

    test.engine.sync().sync_all().await.unwrap();
    let calls = test.remote.calls();
    assert_eq!(calls.iter().filter(|c| is_step(c, "A")).count(), 1);
    assert_eq!(calls.iter().filter(|c| is_step(c, "B")).count(), 2);
    assert_eq!(calls.iter().filter(|c| is_step(c, "C")).count(), 1);
}

#[tokio::test]
async fn test_mid_run_disconnect_leaves_rest_pending() {
    let test = offline_engine().await;
    let ids = queue_steps(&test, &["A", "B", "C"]).await;
    test.go_online().await;

    let monitor = test.engine.monitor().clone();
    test.remote.after_success(move |count| {
        if count == 1 {
            monitor.report_offline();
        }
    });

    let summary = test.engine.sync().sync_all().await.unwrap().unwrap();
    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.skipped(), 2);

    let queue = test.engine.sync().queue();
    assert_queue_item(queue, ids[0], QueueStatus::Completed, 0).await;
    assert_queue_item(queue, ids[1], QueueStatus::Pending, 0).await;
    assert_queue_item(queue, ids[2], QueueStatus::Pending, 0).await;

    test.go_online().await;
    let summary = test.engine.sync().sync_all().await.unwrap().unwrap();
    assert_eq!(summary.total, 2);
    let calls = test.remote.calls();
    assert_eq!(calls.iter().filter(|c| is_step(c, "A")).count(), 1);
    assert_eq!(calls.len(), 3);
}

#[tokio::test]
async fn test_permanent_error_is_terminal_immediately() {
    let test = offline_engine().await;
    let ids = queue_steps(&test, &["A"]).await;
    test.remote.fail_all(RemoteError::http(422, "invalid entity"));
    test.go_online().await;

    test.engine.sync().sync_all().await.unwrap();
    assert_queue_item(test.engine.sync().queue(), ids[0], QueueStatus::Failed, 5).await;

    // Operator reset gives the item a fresh budget
    test.remote.succeed_all();
    assert!(test.engine.sync().queue().retry_failed(ids[0]).await.unwrap());
    test.engine.sync().sync_all().await.unwrap();
    assert_queue_item(test.engine.sync().queue(), ids[0], QueueStatus::Completed, 0).await;
}

#[tokio::test]
async fn test_missing_asset_blob_is_terminal() {
    let test = offline_engine().await;
    let id = test
        .engine
        .sync()
        .queue()
        .enqueue(&QueuePayload::UploadAsset {
            asset_id: "gone".to_string(),
            parent_room_id: 10,
            entity_id: "entity-1".to_string(),
        })
        .await
        .unwrap();
    test.go_online().await;

    let summary = test.engine.sync().sync_all().await.unwrap().unwrap();
    assert_eq!(summary.error_count, 1);
    let item = assert_queue_item(test.engine.sync().queue(), id, QueueStatus::Failed, 5).await;
    assert!(item.last_error.unwrap().contains("gone"));
    assert_eq!(test.remote.call_count(), 0);
}

#[tokio::test]
async fn test_queued_asset_uploads_stored_bytes() {
    let test = offline_engine().await;
    let upload = test
        .engine
        .gateway()
        .upload_asset(10, Some("entity-1"), "image/jpeg", &[0xFF, 0xD8])
        .await
        .unwrap();
    assert!(upload.outcome.unwrap().is_offline());
    test.go_online().await;

    test.engine.sync().sync_all().await.unwrap();
    assert_eq!(
        test.remote.calls(),
        vec![RemoteCall::UploadAsset {
            entity_id: "entity-1".to_string(),
            asset_id: upload.asset.id.clone(),
            bytes: vec![0xFF, 0xD8],
        }]
    );
    let assets = test.engine.database().assets_for_entity("entity-1").await.unwrap();
    assert!(assets[0].synced);
}

#[tokio::test]
async fn test_concurrent_sync_calls_do_not_overlap() {
    let test = offline_engine().await;
    queue_steps(&test, &["A"]).await;
    test.remote.hang_all();
    test.go_online().await;

    let sync = test.engine.sync();
    let second_attempt = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sync.is_syncing());
        // Second trigger while the first pass is stuck on the hung remote
        sync.sync_all().await.unwrap()
    };
    let (first, second) = join(sync.sync_all(), second_attempt).await;

    assert_eq!(second, None);
    assert_eq!(first.unwrap().unwrap().error_count, 1);
    assert!(!test.engine.sync().is_syncing());
    assert_eq!(test.remote.call_count(), 1);
}

#[tokio::test]
async fn test_events_are_emitted_in_order() {
    let test = offline_engine().await;
    queue_steps(&test, &["A", "B"]).await;
    test.go_online().await;

    let mut events = test.engine.sync().subscribe();
    test.engine.sync().sync_all().await.unwrap();

    assert_eq!(events.recv().await.unwrap(), SyncEvent::SyncStart);
    assert_eq!(
        events.recv().await.unwrap(),
        SyncEvent::SyncComplete(SyncSummary {
            success_count: 2,
            error_count: 0,
            total: 2
        })
    );
}

#[tokio::test]
async fn test_callback_subscription() {
    let test = online_engine().await;
    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));

    let sink = seen.clone();
    let subscription = test.engine.sync().on_event(move |event| {
        sink.lock().unwrap().push(event.clone());
    });

    test.engine.sync().sync_all().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(seen.lock().unwrap().len(), 2);

    subscription.unsubscribe();
    tokio::time::sleep(Duration::from_millis(20)).await;
    test.engine.sync().sync_all().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_reconnection_triggers_auto_sync() {
    let test = offline_engine().await;
    queue_steps(&test, &["A"]).await;

    let mut events = test.engine.sync().subscribe();
    test.engine
        .sync()
        .start_auto_sync(Duration::from_secs(3600))
        .await;

    test.go_online().await;
    let summary = wait_for_complete(&mut events).await;
    assert_eq!(summary.success_count, 1);

    test.engine.sync().stop_auto_sync().await;
}

#[tokio::test]
async fn test_visibility_triggers_auto_sync() {
    let test = online_engine().await;
    let mut events = test.engine.sync().subscribe();
    test.engine
        .sync()
        .start_auto_sync(Duration::from_secs(3600))
        .await;

    queue_steps_online(&test).await;
    test.engine.sync().notify_visible();
    let summary = wait_for_complete(&mut events).await;
    assert_eq!(summary.total, 1);

    test.engine.sync().stop_auto_sync().await;
}

/// Queue an item while online by failing the direct attempt
async fn queue_steps_online(test: &TestEngine) {
    test.remote
        .fail_all(RemoteError::Network("flaky".to_string()));
    test.engine
        .gateway()
        .update_entity("entity-1", &json!({"step": "V"}))
        .await
        .unwrap();
    test.remote.succeed_all();
}

#[tokio::test]
async fn test_status_reports_queue_and_connectivity() {
    let test = offline_engine().await;
    queue_steps(&test, &["A", "B"]).await;

    let status = test.engine.sync().status().await.unwrap();
    assert!(!status.online);
    assert_eq!(status.pending, 2);
    assert!(status.last_sync.is_none());

    test.go_online().await;
    test.engine.sync().sync_all().await.unwrap();
    let status = test.engine.sync().status().await.unwrap();
    assert!(status.online);
    assert!(status.is_settled());
    assert!(status.last_sync.is_some());

    let metrics = test.engine.sync().metrics().await;
    assert_eq!(metrics.total_runs, 1);
    assert_eq!(metrics.items_applied, 2);
}
