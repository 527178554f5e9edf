//! Push subscription and notification tests.
//!
//! Delivery goes through the recording sender; endpoints containing
//! `"broken"` fail.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use serde_json::{Value, json};

use campus_market_core::UserId;
use campus_market_integration_tests::TestApp;
use campus_market_storefront::backend::memory::Fault;

fn subscription(user_id: UserId, endpoint: &str) -> Value {
    json!({
        "user_id": user_id,
        "endpoint": endpoint,
        "keys": { "p256dh": "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA", "auth": "tBHItJI5svbpez7KI4CCXg" }
    })
}

// =============================================================================
// save-subscription
// =============================================================================

#[tokio::test]
async fn test_save_subscription() {
    let mut app = TestApp::new();
    let user_id = UserId::random();

    let resp = app
        .post(
            "/api/save-subscription",
            None,
            subscription(user_id, "https://push.example/a"),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text);
    assert_eq!(resp.json, json!({ "success": true }));

    let stored = app.backend.subscriptions().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].user_id, Some(user_id));
}

#[tokio::test]
async fn test_save_subscription_replaces_same_endpoint() {
    let mut app = TestApp::new();
    let first = UserId::random();
    let second = UserId::random();

    app.post(
        "/api/save-subscription",
        None,
        subscription(first, "https://push.example/a"),
    )
    .await;
    app.post(
        "/api/save-subscription",
        None,
        subscription(second, "https://push.example/a"),
    )
    .await;

    let stored = app.backend.subscriptions().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].user_id, Some(second));
}

#[tokio::test]
async fn test_save_subscription_missing_fields() {
    let mut app = TestApp::new();

    for body in [
        json!({ "user_id": UserId::random(), "keys": { "p256dh": "k", "auth": "a" } }),
        json!({ "user_id": UserId::random(), "endpoint": "", "keys": { "p256dh": "k", "auth": "a" } }),
        json!({ "user_id": UserId::random(), "endpoint": "https://push.example/a" }),
    ] {
        let resp = app.post("/api/save-subscription", None, body).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.json["error"], "Missing endpoint or keys");
    }
    assert!(app.backend.subscriptions().await.is_empty());
}

#[tokio::test]
async fn test_save_subscription_empty_keys() {
    let mut app = TestApp::new();

    let resp = app
        .post(
            "/api/save-subscription",
            None,
            json!({ "user_id": UserId::random(), "endpoint": "https://push.example/a", "keys": {} }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json["error"], "Missing endpoint or keys");
    assert!(app.backend.subscriptions().await.is_empty());
}

#[tokio::test]
async fn test_save_subscription_storage_failure() {
    let mut app = TestApp::new();
    app.backend.inject_fault(Fault::UpsertSubscription).await;

    let resp = app
        .post(
            "/api/save-subscription",
            None,
            subscription(UserId::random(), "https://push.example/a"),
        )
        .await;

    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
}

// =============================================================================
// send-notification
// =============================================================================

#[tokio::test]
async fn test_send_notification_requires_user_id() {
    let mut app = TestApp::new();

    let resp = app
        .post("/api/send-notification", None, json!({ "title": "Hi" }))
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(app.push.attempted_endpoints().is_empty());
}

#[tokio::test]
async fn test_send_notification_malformed_user_id() {
    let mut app = TestApp::new();

    let resp = app
        .post(
            "/api/send-notification",
            None,
            json!({ "user_id": "not-a-uuid", "title": "Hi" }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.json["error"].is_string());
    assert!(app.push.attempted_endpoints().is_empty());
}

#[tokio::test]
async fn test_send_notification_without_content_type() {
    let mut app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/send-notification")
        .body(Body::from(json!({ "user_id": UserId::random() }).to_string()))
        .unwrap();

    let resp = app.send(request).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.json["error"].is_string());
}

#[tokio::test]
async fn test_send_notification_without_subscriptions() {
    let mut app = TestApp::new();

    let resp = app
        .post(
            "/api/send-notification",
            None,
            json!({ "user_id": UserId::random(), "title": "Hi", "body": "there" }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.json["error"], "No subscriptions found for user");
    assert!(app.push.attempted_endpoints().is_empty());
}

#[tokio::test]
async fn test_send_notification_reports_each_endpoint() {
    let mut app = TestApp::new();
    let user_id = UserId::random();
    for endpoint in [
        "https://push.example/phone",
        "https://push.example/broken-laptop",
        "https://push.example/tablet",
    ] {
        app.post("/api/save-subscription", None, subscription(user_id, endpoint))
            .await;
    }
    // Someone else's device is not notified
    app.post(
        "/api/save-subscription",
        None,
        subscription(UserId::random(), "https://push.example/other"),
    )
    .await;

    let resp = app
        .post(
            "/api/send-notification",
            None,
            json!({
                "user_id": user_id,
                "title": "Order ready",
                "body": "Pick it up at the desk",
                "url": "/orders"
            }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text);
    assert_eq!(resp.json["success"], true);
    let results = resp.json["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    let failed: Vec<_> = results.iter().filter(|r| r["success"] == false).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["endpoint"], "https://push.example/broken-laptop");
    assert!(failed[0]["error"].is_string());

    assert_eq!(app.push.attempted_endpoints().len(), 3);
    let payload = &app.push.payloads()[0];
    assert_eq!(payload.title, "Order ready");
    assert_eq!(payload.url.as_deref(), Some("/orders"));
}

#[tokio::test]
async fn test_send_notification_lookup_failure() {
    let mut app = TestApp::new();
    app.backend.inject_fault(Fault::ListSubscriptions).await;

    let resp = app
        .post(
            "/api/send-notification",
            None,
            json!({ "user_id": UserId::random() }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
}

// =============================================================================
// Method handling
// =============================================================================

#[tokio::test]
async fn test_push_routes_reject_get() {
    let mut app = TestApp::new();

    for uri in ["/api/save-subscription", "/api/send-notification"] {
        let resp = app.get(uri, None).await;
        assert_eq!(resp.status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
