//! Admin OTP gate tests.
//!
//! The gate state rides in the session cookie, so each test keeps one
//! `TestApp` for the whole flow.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use campus_market_core::AdminRole;
use campus_market_integration_tests::TestApp;
use campus_market_storefront::backend::{MemoryBackend, memory::Fault};

// =============================================================================
// Sending a code
// =============================================================================

#[tokio::test]
async fn test_status_starts_idle() {
    let mut app = TestApp::new();

    let resp = app.get("/admin/otp/status", None).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["state"], "idle");
    assert!(resp.json.get("redirect").is_none());
}

#[tokio::test]
async fn test_send_code_starts_countdown() {
    let mut app = TestApp::new();
    app.user("ops@campus.edu").await;

    let sent = app
        .post("/admin/otp/send", None, json!({ "email": "ops@campus.edu" }))
        .await;

    assert_eq!(sent.status, StatusCode::OK, "{}", sent.text);
    assert_eq!(sent.json["state"], "otp_sent");
    let remaining = sent.json["remaining_seconds"].as_u64().unwrap();
    assert!(remaining > 100 && remaining <= 120);

    let status = app.get("/admin/otp/status", None).await;
    assert_eq!(status.json["state"], "otp_sent");
    assert_eq!(app.backend.otp_requests().await.len(), 1);
}

#[tokio::test]
async fn test_send_code_rejects_malformed_email() {
    let mut app = TestApp::new();

    let resp = app
        .post("/admin/otp/send", None, json!({ "email": "not-an-email" }))
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(app.backend.otp_requests().await.is_empty());
}

#[tokio::test]
async fn test_send_code_to_unknown_address_is_rejected() {
    let mut app = TestApp::new();

    let resp = app
        .post("/admin/otp/send", None, json!({ "email": "stranger@campus.edu" }))
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    let status = app.get("/admin/otp/status", None).await;
    assert_eq!(status.json["state"], "idle");
}

#[tokio::test]
async fn test_send_code_backend_outage_is_internal_error() {
    let mut app = TestApp::new();
    app.user("ops@campus.edu").await;
    app.backend.inject_fault(Fault::SendOtp).await;

    let resp = app
        .post("/admin/otp/send", None, json!({ "email": "ops@campus.edu" }))
        .await;

    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
}

// =============================================================================
// Verification
// =============================================================================

#[tokio::test]
async fn test_verify_without_code_requested() {
    let mut app = TestApp::new();

    let resp = app
        .post("/admin/otp/verify", None, json!({ "code": "123456" }))
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_active_admin_is_authorized() {
    let mut app = TestApp::new();
    let record = app.admin_session("ops@campus.edu", false).await;

    let status = app.get("/admin/otp/status", None).await;
    assert_eq!(status.json["state"], "authorized");
    assert_eq!(status.json["redirect"]["to"], "/admin/dashboard");

    let dashboard = app.get("/admin/dashboard", None).await;
    assert_eq!(dashboard.status, StatusCode::OK, "{}", dashboard.text);
    assert_eq!(dashboard.json["admin_id"], json!(record.id));
    assert_eq!(dashboard.json["email"], "ops@campus.edu");
    assert_eq!(dashboard.json["is_master_admin"], false);
}

#[tokio::test]
async fn test_wrong_code_keeps_challenge_open() {
    let mut app = TestApp::new();
    let ops = app.user("ops@campus.edu").await;
    app.backend
        .add_admin_record(ops.user_id, AdminRole::Admin, true, false)
        .await;
    app.post("/admin/otp/send", None, json!({ "email": "ops@campus.edu" }))
        .await;

    let wrong = app
        .post("/admin/otp/verify", None, json!({ "code": "000000" }))
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let status = app.get("/admin/otp/status", None).await;
    assert_eq!(status.json["state"], "otp_sent");

    let right = app
        .post(
            "/admin/otp/verify",
            None,
            json!({ "code": MemoryBackend::DEFAULT_OTP_CODE }),
        )
        .await;
    assert_eq!(right.status, StatusCode::OK);
    assert_eq!(right.json["state"], "authorized");
}

#[tokio::test]
async fn test_only_the_issued_code_verifies() {
    let mut app = TestApp::new();
    let ops = app.user("ops@campus.edu").await;
    app.backend
        .add_admin_record(ops.user_id, AdminRole::Admin, true, false)
        .await;
    app.backend.set_otp_code("654321").await;
    app.post("/admin/otp/send", None, json!({ "email": "ops@campus.edu" }))
        .await;

    let stale = app
        .post(
            "/admin/otp/verify",
            None,
            json!({ "code": MemoryBackend::DEFAULT_OTP_CODE }),
        )
        .await;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);

    let issued = app
        .post("/admin/otp/verify", None, json!({ "code": "654321" }))
        .await;
    assert_eq!(issued.json["state"], "authorized");
}

#[tokio::test]
async fn test_verify_outage_keeps_challenge_open() {
    let mut app = TestApp::new();
    let ops = app.user("ops@campus.edu").await;
    app.backend
        .add_admin_record(ops.user_id, AdminRole::Admin, true, false)
        .await;
    app.post("/admin/otp/send", None, json!({ "email": "ops@campus.edu" }))
        .await;
    app.backend.inject_fault(Fault::VerifyOtp).await;

    let resp = app
        .post(
            "/admin/otp/verify",
            None,
            json!({ "code": MemoryBackend::DEFAULT_OTP_CODE }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!resp.text.contains("injected"));

    let status = app.get("/admin/otp/status", None).await;
    assert_eq!(status.json["state"], "otp_sent");

    app.backend.clear_faults().await;
    let retry = app
        .post(
            "/admin/otp/verify",
            None,
            json!({ "code": MemoryBackend::DEFAULT_OTP_CODE }),
        )
        .await;
    assert_eq!(retry.json["state"], "authorized");
}

#[tokio::test]
async fn test_malformed_code_is_bad_request() {
    let mut app = TestApp::new();
    app.user("ops@campus.edu").await;
    app.post("/admin/otp/send", None, json!({ "email": "ops@campus.edu" }))
        .await;

    let resp = app
        .post("/admin/otp/verify", None, json!({ "code": "12ab" }))
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_admin_is_denied() {
    let mut app = TestApp::new();
    app.user("student@campus.edu").await;
    app.post(
        "/admin/otp/send",
        None,
        json!({ "email": "student@campus.edu" }),
    )
    .await;

    let resp = app
        .post(
            "/admin/otp/verify",
            None,
            json!({ "code": MemoryBackend::DEFAULT_OTP_CODE }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["state"], "denied");
    assert_eq!(resp.json["redirect"]["to"], "/");
    assert_eq!(resp.json["redirect"]["after_seconds"], 0);
    assert!(resp.json["message"].is_string());

    let dashboard = app.get("/admin/dashboard", None).await;
    assert_eq!(dashboard.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_inactive_admin_is_denied_with_delay() {
    let mut app = TestApp::new();
    let ops = app.user("ops@campus.edu").await;
    app.backend
        .add_admin_record(ops.user_id, AdminRole::Support, false, false)
        .await;
    app.post("/admin/otp/send", None, json!({ "email": "ops@campus.edu" }))
        .await;

    let resp = app
        .post(
            "/admin/otp/verify",
            None,
            json!({ "code": MemoryBackend::DEFAULT_OTP_CODE }),
        )
        .await;

    assert_eq!(resp.json["state"], "denied");
    assert_eq!(resp.json["redirect"]["to"], "/");
    assert_eq!(resp.json["redirect"]["after_seconds"], 3);
    assert!(
        resp.json["message"]
            .as_str()
            .unwrap()
            .contains("deactivated")
    );
}

// =============================================================================
// Re-validation and logout
// =============================================================================

#[tokio::test]
async fn test_deactivated_admin_loses_dashboard() {
    let mut app = TestApp::new();
    let record = app.admin_session("ops@campus.edu", false).await;

    let before = app.get("/admin/dashboard", None).await;
    assert_eq!(before.status, StatusCode::OK);

    app.backend.set_admin_active(record.id, false).await;

    let after = app.get("/admin/dashboard", None).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);

    let status = app.get("/admin/otp/status", None).await;
    assert_eq!(status.json["state"], "idle");
}

#[tokio::test]
async fn test_session_is_not_shared() {
    let mut app = TestApp::new();
    app.admin_session("ops@campus.edu", false).await;

    app.drop_session();

    let dashboard = app.get("/admin/dashboard", None).await;
    assert_eq!(dashboard.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_send_while_authorized_conflicts() {
    let mut app = TestApp::new();
    app.admin_session("ops@campus.edu", false).await;

    let resp = app
        .post("/admin/otp/send", None, json!({ "email": "ops@campus.edu" }))
        .await;

    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_logout_returns_to_idle() {
    let mut app = TestApp::new();
    app.admin_session("ops@campus.edu", false).await;

    let resp = app.post("/admin/logout", None, json!({})).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["state"], "idle");

    let dashboard = app.get("/admin/dashboard", None).await;
    assert_eq!(dashboard.status, StatusCode::UNAUTHORIZED);
}
