//! HTTP remote tests against a wiremock server

use chrono::Utc;
use fieldsync::local_db::AssetMeta;
use fieldsync::remote::{ConnectivityProbe, HttpProbe, HttpRemote, RemoteApi, RemoteError};
use fieldsync::shared::AppConfig;
use bytes::Bytes;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_bytes, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> AppConfig {
    AppConfig::builder()
        .server_url(server.uri())
        .api_token("secret-token")
        .request_timeout(Duration::from_millis(500))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_update_entity_sends_bearer_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/entities/entity-1"))
        .and(header("Authorization", "Bearer secret-token"))
        .and(body_json(json!({"floor": 2})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let remote = HttpRemote::new(config_for(&server)).unwrap();
    remote
        .update_entity("entity-1", &json!({"floor": 2}))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_upload_asset_sends_raw_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/entities/entity-1/assets"))
        .and(query_param("roomId", "10"))
        .and(header("X-Asset-Id", "asset-1"))
        .and(header("Content-Type", "image/jpeg"))
        .and(body_bytes(vec![0xFF, 0xD8, 0xFF]))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let meta = AssetMeta {
        id: "asset-1".to_string(),
        parent_room_id: 10,
        related_entity_id: Some("entity-1".to_string()),
        content_type: "image/jpeg".to_string(),
        size: 3,
        synced: false,
        created_at: Utc::now(),
    };
    let remote = HttpRemote::new(config_for(&server)).unwrap();
    remote
        .upload_asset("entity-1", &meta, Bytes::from_static(&[0xFF, 0xD8, 0xFF]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_client_error_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/entities/entity-1/offer"))
        .respond_with(ResponseTemplate::new(422).set_body_string("total must be positive"))
        .mount(&server)
        .await;

    let remote = HttpRemote::new(config_for(&server)).unwrap();
    let error = remote
        .update_offer("entity-1", &json!({"total": -1}))
        .await
        .unwrap_err();

    assert_eq!(error, RemoteError::http(422, "total must be positive"));
    assert!(error.is_permanent());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/entities/entity-1/inspection"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let remote = HttpRemote::new(config_for(&server)).unwrap();
    let error = remote
        .save_inspection("entity-1", &Default::default())
        .await
        .unwrap_err();

    assert!(matches!(error, RemoteError::Http { status: 503, .. }));
    assert!(!error.is_permanent());
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let remote = HttpRemote::new(config_for(&server)).unwrap();
    let error = remote
        .update_entity("entity-1", &json!({}))
        .await
        .unwrap_err();

    assert!(matches!(error, RemoteError::Timeout(_)));
}

#[tokio::test]
async fn test_fetch_catalog_decodes_rooms() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/catalog/rooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 10, "name": "Kitchen", "items": [ { "id": 1, "name": "Fridge", "volume": 1.2 } ] }
        ])))
        .mount(&server)
        .await;

    let remote = HttpRemote::new(config_for(&server)).unwrap();
    let catalog = remote.fetch_catalog().await.unwrap();

    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].items[0].name, "Fridge");
    assert_eq!(catalog[0].items[0].structure.get("volume"), Some(&json!(1.2)));
}

#[tokio::test]
async fn test_fetch_catalog_rejects_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/catalog/rooms"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let remote = HttpRemote::new(config_for(&server)).unwrap();
    let error = remote.fetch_catalog().await.unwrap_err();

    assert!(matches!(error, RemoteError::Decode(_)));
    assert!(error.is_permanent());
}

#[tokio::test]
async fn test_probe_reachable_on_client_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(&config_for(&server)).unwrap();
    assert!(probe.probe().await);
}

#[tokio::test]
async fn test_probe_unreachable_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(&config_for(&server)).unwrap();
    assert!(!probe.probe().await);
}

#[tokio::test]
async fn test_probe_unreachable_without_server() {
    let config = AppConfig::builder()
        .server_url("http://127.0.0.1:9")
        .build()
        .unwrap();

    let probe = HttpProbe::new(&config).unwrap();
    assert!(!probe.probe().await);
}

#[tokio::test]
async fn test_entity_id_is_one_encoded_segment() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/entities/a%2Fb%3Fc/offer"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let remote = HttpRemote::new(config_for(&server)).unwrap();
    remote
        .update_offer("a/b?c", &json!({"total": 1}))
        .await
        .unwrap();
}
