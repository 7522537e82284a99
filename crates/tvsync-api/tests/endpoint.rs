//! `/user-sync` behaviour over real HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tvsync_api::{app_router, AppConfig, AppState, KvStore, MemoryKvStore, StoreError};

async fn spawn_with<S: KvStore>(store: S) -> SocketAddr {
    let config = Arc::new(AppConfig::default());
    let router = app_router(AppState::new(config, store));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn spawn() -> SocketAddr {
    spawn_with(MemoryKvStore::new()).await
}

fn client() -> Client {
    Client::builder().no_proxy().build().unwrap()
}

fn sync_url(addr: SocketAddr, user_id: &str) -> String {
    format!("http://{addr}/user-sync?userId={user_id}")
}

async fn body(response: reqwest::Response) -> Value {
    response.json().await.unwrap()
}

fn assert_cors(response: &reqwest::Response) {
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(
        headers["access-control-allow-methods"],
        "GET, POST, OPTIONS"
    );
    assert_eq!(headers["access-control-allow-headers"], "Content-Type");
}

#[tokio::test]
async fn invalid_user_id_is_rejected() {
    let addr = spawn().await;
    let client = client();

    for bad in ["12a456", "12345", "1234567", ""] {
        let response = client.get(sync_url(addr, bad)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "userId={bad}");
        assert_cors(&response);
        assert_eq!(
            body(response).await,
            json!({"success": false, "message": "Invalid user id"})
        );
    }

    let response = client
        .get(format!("http://{addr}/user-sync"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let addr = spawn().await;
    let response = client()
        .get(sync_url(addr, "123456"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_cors(&response);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .contains("application/json"));
    assert_eq!(
        body(response).await,
        json!({"success": false, "message": "No sync data found"})
    );
}

#[tokio::test]
async fn post_requires_json_content_type() {
    let addr = spawn().await;
    let response = client()
        .post(sync_url(addr, "123456"))
        .header("content-type", "text/plain")
        .body(r#"{"searchHistory":[]}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["message"], "JSON body required");
}

#[tokio::test]
async fn post_requires_object_body() {
    let addr = spawn().await;
    let client = client();

    for raw in ["[1,2]", "null", "42", "{not json"] {
        let response = client
            .post(sync_url(addr, "123456"))
            .header("content-type", "application/json; charset=utf-8")
            .body(raw)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body={raw}");
        assert_eq!(body(response).await["message"], "Invalid data format");
    }
}

#[tokio::test]
async fn post_then_get_returns_document_with_server_timestamp() {
    let addr = spawn().await;
    let client = client();
    let before = chrono::Utc::now().timestamp_millis();

    let document = json!({
        "viewingHistory": [{"title": "Show", "episodeIndex": 1}],
        "searchHistory": ["drama"],
        "lastSyncTime": 1
    });
    let response = client
        .post(sync_url(addr, "123456"))
        .json(&document)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);
    assert_eq!(
        body(response).await,
        json!({"success": true, "message": "Data synced successfully"})
    );

    let response = client.get(sync_url(addr, "123456")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body(response).await;
    assert_eq!(payload["success"], json!(true));
    let data = &payload["data"];
    assert_eq!(data["viewingHistory"], document["viewingHistory"]);
    assert_eq!(data["searchHistory"], json!(["drama"]));
    assert!(data["lastSyncTime"].as_i64().unwrap() >= before);
}

#[tokio::test]
async fn second_post_overwrites_first() {
    let addr = spawn().await;
    let client = client();

    for document in [json!({"first": true}), json!({"second": true})] {
        let response = client
            .post(sync_url(addr, "222222"))
            .json(&document)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = client.get(sync_url(addr, "222222")).send().await.unwrap();
    let data = body(response).await["data"].clone();
    assert_eq!(data.get("first"), None);
    assert_eq!(data["second"], json!(true));

    let other = client.get(sync_url(addr, "333333")).send().await.unwrap();
    assert_eq!(other.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn options_is_a_bare_preflight() {
    let addr = spawn().await;
    let response = client()
        .request(Method::OPTIONS, format!("http://{addr}/user-sync"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_cors(&response);
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn unsupported_methods_are_rejected_after_id_validation() {
    let addr = spawn().await;
    let client = client();

    let response = client.put(sync_url(addr, "123456")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_cors(&response);

    let response = client.delete(sync_url(addr, "abc")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn healthz_reports_ok() {
    let addr = spawn().await;
    let response = client()
        .get(format!("http://{addr}/healthz"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["status"], "ok");
}

struct BrokenStore;

impl KvStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Err(StoreError::Io(std::io::Error::other("namespace unavailable")))
    }

    async fn put(&self, _key: &str, _value: Vec<u8>) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("namespace unavailable")))
    }
}

#[tokio::test]
async fn store_failures_are_server_errors() {
    let addr = spawn_with(BrokenStore).await;
    let client = client();

    let response = client.get(sync_url(addr, "123456")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body(response).await["message"], "Failed to load data");

    let response = client
        .post(sync_url(addr, "123456"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body(response).await["message"], "Failed to save data");
}
