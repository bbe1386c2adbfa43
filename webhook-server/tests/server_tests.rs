use std::sync::Arc;

use axum_test::http::HeaderValue;
use axum_test::TestServer;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use webhook_core::config::EngineConfig;
use webhook_core::dispatcher::Dispatcher;
use webhook_core::memory::{MemoryDispatcher, MemoryStore};
use webhook_core::store::Store;
use webhook_server::{create_app, AuthMode, JwtConfig};

fn make_server(store: Arc<MemoryStore>, dispatcher: Arc<MemoryDispatcher>, auth_mode: AuthMode) -> TestServer {
    let app = create_app(store, dispatcher, Arc::new(EngineConfig::default()), auth_mode);
    TestServer::new(app)
}

fn make_no_auth_server() -> (Arc<MemoryStore>, TestServer) {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(MemoryDispatcher::new(16));
    let server = make_server(Arc::clone(&store), dispatcher, AuthMode::None);
    (store, server)
}

const JWT_SECRET: &str = "test-secret-key-for-jwt-signing-needs-to-be-long-enough";

fn make_jwt_server() -> (Arc<MemoryStore>, TestServer) {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(MemoryDispatcher::new(16));
    let auth_mode = AuthMode::Jwt(JwtConfig {
        algorithm: jsonwebtoken::Algorithm::HS256,
        secret: Some(JWT_SECRET.to_string()),
        public_key: None,
        issuer: None,
        audience: None,
    });
    let server = make_server(Arc::clone(&store), dispatcher, auth_mode);
    (store, server)
}

fn make_token(claims: serde_json::Value) -> String {
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}

fn make_full_access_token() -> String {
    make_token(json!({ "sub": "test-user", "scope": ["*"], "exp": 9_999_999_999u64 }))
}

fn bearer_header(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

// ─── POST /webhooks ──────────────────────────────────────────────────────────

#[tokio::test]
async fn post_webhooks_registers_config_returns_201() {
    let (_store, server) = make_no_auth_server();

    let response = server
        .post("/webhooks")
        .json(&json!({
            "name": "orders",
            "targetUrl": "https://example.test/hook",
            "secret": "s3cr3t"
        }))
        .await;

    response.assert_status(axum_test::http::StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["name"], "orders");
    assert_eq!(body["active"], true);
}

#[tokio::test]
async fn post_webhooks_rejects_invalid_name() {
    let (_store, server) = make_no_auth_server();

    let response = server
        .post("/webhooks")
        .json(&json!({
            "name": "has space",
            "targetUrl": "https://example.test/hook",
            "secret": "s3cr3t"
        }))
        .await;

    response.assert_status(axum_test::http::StatusCode::BAD_REQUEST);
}

// ─── POST /webhooks/:name/events ─────────────────────────────────────────────

#[tokio::test]
async fn post_event_accepts_and_returns_message_id() {
    let (_store, server) = make_no_auth_server();

    server
        .post("/webhooks")
        .json(&json!({ "name": "orders", "targetUrl": "https://example.test/hook", "secret": "s3cr3t" }))
        .await;

    let response = server
        .post("/webhooks/orders/events")
        .json(&json!({ "payload": { "orderId": "o_1" } }))
        .await;

    response.assert_status(axum_test::http::StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    assert!(body["messageId"].is_string());
}

#[tokio::test]
async fn post_event_returns_404_for_unknown_webhook() {
    let (_store, server) = make_no_auth_server();

    let response = server.post("/webhooks/missing/events").json(&json!({ "payload": { "a": 1 } })).await;
    response.assert_status(axum_test::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn post_event_honors_target_url_override() {
    let (store, server) = make_no_auth_server();

    server
        .post("/webhooks")
        .json(&json!({ "name": "orders", "targetUrl": "https://example.test/hook", "secret": "s3cr3t" }))
        .await;

    let created = server
        .post("/webhooks/orders/events")
        .json(&json!({ "payload": { "a": 1 }, "targetUrl": "https://override.test/hook" }))
        .await;
    let message_id = created.json::<serde_json::Value>()["messageId"].as_str().unwrap().to_string();

    let message = store.get_message(&message_id).await.unwrap();
    assert_eq!(message.target_url, "https://override.test/hook");
}

// ─── GET /messages/:id ───────────────────────────────────────────────────────

#[tokio::test]
async fn get_message_returns_persisted_message() {
    let (_store, server) = make_no_auth_server();

    server
        .post("/webhooks")
        .json(&json!({ "name": "orders", "targetUrl": "https://example.test/hook", "secret": "s3cr3t" }))
        .await;
    let created = server.post("/webhooks/orders/events").json(&json!({ "payload": { "a": 1 } })).await;
    let message_id = created.json::<serde_json::Value>()["messageId"].as_str().unwrap().to_string();

    let response = server.get(&format!("/messages/{message_id}")).await;
    response.assert_status(axum_test::http::StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn get_message_returns_404_for_missing() {
    let (_store, server) = make_no_auth_server();
    let response = server.get("/messages/nonexistent").await;
    response.assert_status(axum_test::http::StatusCode::NOT_FOUND);
}

// ─── POST /messages/:id/cancel ───────────────────────────────────────────────

#[tokio::test]
async fn cancel_pending_message_returns_200() {
    let (_store, server) = make_no_auth_server();

    server
        .post("/webhooks")
        .json(&json!({ "name": "orders", "targetUrl": "https://example.test/hook", "secret": "s3cr3t" }))
        .await;
    let created = server.post("/webhooks/orders/events").json(&json!({ "payload": { "a": 1 } })).await;
    let message_id = created.json::<serde_json::Value>()["messageId"].as_str().unwrap().to_string();

    let response = server.post(&format!("/messages/{message_id}/cancel")).await;
    response.assert_status(axum_test::http::StatusCode::OK);

    let after = server.get(&format!("/messages/{message_id}")).await;
    let body: serde_json::Value = after.json();
    assert_eq!(body["status"], "cancelled");
}

// ─── POST /messages/:id/retry and bulk-retry ─────────────────────────────────

#[tokio::test]
async fn retry_on_non_failed_message_returns_400() {
    let (_store, server) = make_no_auth_server();

    server
        .post("/webhooks")
        .json(&json!({ "name": "orders", "targetUrl": "https://example.test/hook", "secret": "s3cr3t" }))
        .await;
    let created = server.post("/webhooks/orders/events").json(&json!({ "payload": { "a": 1 } })).await;
    let message_id = created.json::<serde_json::Value>()["messageId"].as_str().unwrap().to_string();

    let response = server.post(&format!("/messages/{message_id}/retry")).await;
    response.assert_status(axum_test::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_retry_reports_only_eligible_ids() {
    let (_store, server) = make_no_auth_server();

    server
        .post("/webhooks")
        .json(&json!({ "name": "orders", "targetUrl": "https://example.test/hook", "secret": "s3cr3t" }))
        .await;
    let created = server.post("/webhooks/orders/events").json(&json!({ "payload": { "a": 1 } })).await;
    let message_id = created.json::<serde_json::Value>()["messageId"].as_str().unwrap().to_string();

    let response = server
        .post("/messages/bulk-retry")
        .json(&json!({ "messageIds": [message_id, "nonexistent"] }))
        .await;

    response.assert_status(axum_test::http::StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["retried"].as_array().unwrap().len(), 0);
}

// ─── GET /webhooks/:name/health ───────────────────────────────────────────────

#[tokio::test]
async fn get_health_returns_stats_for_known_webhook() {
    let (_store, server) = make_no_auth_server();

    server
        .post("/webhooks")
        .json(&json!({ "name": "orders", "targetUrl": "https://example.test/hook", "secret": "s3cr3t" }))
        .await;

    let response = server.get("/webhooks/orders/health").await;
    response.assert_status(axum_test::http::StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["totalSent"], 0);
}

// ─── Auth: JWT mode ──────────────────────────────────────────────────────────

#[tokio::test]
async fn jwt_mode_returns_401_without_token() {
    let (_store, server) = make_jwt_server();

    let response = server.post("/webhooks").json(&json!({})).await;

    response.assert_status(axum_test::http::StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Missing Bearer token");
}

#[tokio::test]
async fn jwt_mode_returns_401_with_invalid_token() {
    let (_store, server) = make_jwt_server();

    let response = server
        .post("/webhooks")
        .add_header(axum_test::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer invalid-token-here"))
        .json(&json!({}))
        .await;

    response.assert_status(axum_test::http::StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn jwt_mode_succeeds_with_valid_token() {
    let (_store, server) = make_jwt_server();
    let token = make_full_access_token();

    let response = server
        .post("/webhooks")
        .add_header(axum_test::http::header::AUTHORIZATION, bearer_header(&token))
        .json(&json!({ "name": "orders", "targetUrl": "https://example.test/hook", "secret": "s3cr3t" }))
        .await;

    response.assert_status(axum_test::http::StatusCode::CREATED);
}

#[tokio::test]
async fn jwt_mode_returns_403_for_insufficient_scope() {
    let (_store, server) = make_jwt_server();

    let token = make_token(json!({
        "sub": "limited-user",
        "scope": ["messages:read"],
        "exp": 9_999_999_999u64
    }));

    let response = server
        .post("/webhooks")
        .add_header(axum_test::http::header::AUTHORIZATION, bearer_header(&token))
        .json(&json!({ "name": "orders", "targetUrl": "https://example.test/hook", "secret": "s3cr3t" }))
        .await;

    response.assert_status(axum_test::http::StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Forbidden");
}
