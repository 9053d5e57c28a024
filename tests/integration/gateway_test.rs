//! Write gateway tests
//!
//! Durability of offline writes, non-blocking behavior and the online
//! direct-apply path.

use crate::common::*;
use fieldsync::local_db::{QueuePayload, QueueStatus};
use fieldsync::offline::WriteOutcome;
use fieldsync::remote::RemoteError;
use fieldsync::shared::{InspectionState, SyncError};
use serde_json::json;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_offline_write_is_queued_and_survives_restart() {
    let test = offline_engine().await;

    let outcome = test
        .engine
        .gateway()
        .update_entity("entity-1", &json!({"floor": 2}))
        .await
        .unwrap();
    assert!(outcome.is_offline());
    let id = outcome.queue_item_id().unwrap();

    let before = assert_queue_item(test.engine.sync().queue(), id, QueueStatus::Pending, 0).await;
    assert_eq!(test.remote.call_count(), 0);

    let test = test.restart().await;
    let after = assert_queue_item(test.engine.sync().queue(), id, QueueStatus::Pending, 0).await;
    assert_eq!(before, after);

    // The local effect is durable as well
    let snapshot = test
        .engine
        .database()
        .load_snapshot("entity-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.state.fields.get("floor"), Some(&json!(2)));
}

#[tokio::test]
async fn test_offline_writes_do_not_block_on_hung_network() {
    let test = offline_engine().await;
    test.remote.hang_all();
    let gateway = test.engine.gateway();

    let started = Instant::now();
    gateway
        .update_entity("entity-1", &json!({"floor": 1}))
        .await
        .unwrap();
    gateway
        .save_inspection("entity-1", &InspectionState::default())
        .await
        .unwrap();
    gateway
        .update_offer("entity-1", &json!({"total": 990}))
        .await
        .unwrap();
    gateway
        .upload_asset(10, Some("entity-1"), "image/jpeg", &[1, 2, 3])
        .await
        .unwrap();
    let elapsed = started.elapsed();

    // Four writes, each well under the 50ms budget
    assert!(elapsed < Duration::from_millis(200), "offline writes took {elapsed:?}");
    assert_eq!(test.remote.call_count(), 0);
    assert_eq!(test.engine.sync().get_pending_count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_online_write_applies_without_queue_entry() {
    let test = online_engine().await;

    let outcome = test
        .engine
        .gateway()
        .update_offer("entity-1", &json!({"total": 1200}))
        .await
        .unwrap();

    assert_eq!(outcome, WriteOutcome::Applied);
    assert_eq!(
        test.remote.calls(),
        vec![RemoteCall::UpdateOffer {
            entity_id: "entity-1".to_string(),
            offer_data: json!({"total": 1200}),
        }]
    );
    assert_eq!(test.engine.sync().get_pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_online_failure_falls_back_to_queue() {
    let test = online_engine().await;
    test.remote.fail_all(RemoteError::http(502, "bad gateway"));

    let outcome = test
        .engine
        .gateway()
        .update_entity("entity-1", &json!({"floor": 3}))
        .await
        .unwrap();

    let id = outcome.queue_item_id().expect("write should be queued");
    let item = assert_queue_item(test.engine.sync().queue(), id, QueueStatus::Pending, 0).await;
    assert_eq!(
        item.payload,
        QueuePayload::UpdateEntity {
            entity_id: "entity-1".to_string(),
            data: json!({"floor": 3}),
        }
    );
}

#[tokio::test]
async fn test_online_timeout_falls_back_to_queue() {
    let test = online_engine().await;
    test.remote.hang_all();

    let started = Instant::now();
    let outcome = test
        .engine
        .gateway()
        .save_inspection("entity-1", &InspectionState::default())
        .await
        .unwrap();

    assert!(outcome.is_offline());
    assert!(started.elapsed() < TEST_REQUEST_TIMEOUT * 3);
}

#[tokio::test]
async fn test_asset_upload_online_marks_synced() {
    let test = online_engine().await;

    let upload = test
        .engine
        .gateway()
        .upload_asset(10, Some("entity-1"), "image/png", b"png-bytes")
        .await
        .unwrap();

    assert_eq!(upload.outcome, Some(WriteOutcome::Applied));
    assert!(upload.asset.synced);
    let stored = test
        .engine
        .database()
        .load_asset(&upload.asset.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.meta.synced);
    assert_eq!(
        test.remote.calls(),
        vec![RemoteCall::UploadAsset {
            entity_id: "entity-1".to_string(),
            asset_id: upload.asset.id.clone(),
            bytes: b"png-bytes".to_vec(),
        }]
    );
}

#[tokio::test]
async fn test_asset_without_entity_stays_local() {
    let test = online_engine().await;

    let upload = test
        .engine
        .gateway()
        .upload_asset(10, None, "image/png", b"png-bytes")
        .await
        .unwrap();

    assert_eq!(upload.outcome, None);
    assert!(!upload.asset.synced);
    assert_eq!(test.remote.call_count(), 0);
    assert_eq!(test.engine.sync().get_pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_with_rooms_key_keeps_snapshot_loadable() {
    let test = offline_engine().await;
    let gateway = test.engine.gateway();

    gateway
        .update_entity("entity-1", &json!({"rooms": [{"id": 1, "name": "Hall"}]}))
        .await
        .unwrap();
    let snapshot = test
        .engine
        .database()
        .load_snapshot("entity-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.state.rooms[0].name, "Hall");
    assert!(!snapshot.state.fields.contains_key("rooms"));

    // Later writes for the same entity still reach the queue
    let outcome = gateway
        .update_offer("entity-1", &json!({"total": 50}))
        .await
        .unwrap();
    assert!(outcome.is_offline());
    assert_eq!(test.engine.sync().get_pending_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_malformed_rooms_update_is_rejected_without_side_effects() {
    let test = offline_engine().await;

    let result = test
        .engine
        .gateway()
        .update_entity("entity-1", &json!({"rooms": "kitchen"}))
        .await;

    assert!(matches!(result, Err(SyncError::Validation { field: "rooms", .. })));
    assert!(test
        .engine
        .database()
        .load_snapshot("entity-1")
        .await
        .unwrap()
        .is_none());
    assert_eq!(test.engine.sync().get_pending_count().await.unwrap(), 0);
}
