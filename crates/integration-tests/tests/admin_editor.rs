//! Admin management tests.
//!
//! Adding an admin is two requests: the master verifies an email, then
//! submits a role for the candidate remembered in the session.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use campus_market_core::AdminRole;
use campus_market_integration_tests::TestApp;

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_list_requires_admin_session() {
    let mut app = TestApp::new();

    let resp = app.get("/admin/admins", None).await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_marks_own_record_undeletable() {
    let mut app = TestApp::new();
    let master = app.admin_session("root@campus.edu", true).await;
    let helper = app.user("helper@campus.edu").await;
    let other = app
        .backend
        .add_admin_record(helper.user_id, AdminRole::Moderator, true, false)
        .await;

    let resp = app.get("/admin/admins", None).await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text);

    let listings = resp.json.as_array().unwrap();
    assert_eq!(listings.len(), 2);
    for listing in listings {
        if listing["id"] == json!(master.id) {
            assert_eq!(listing["can_delete"], false);
        } else {
            assert_eq!(listing["id"], json!(other.id));
            assert_eq!(listing["can_delete"], true);
            assert_eq!(listing["role"], "moderator");
        }
    }
}

#[tokio::test]
async fn test_regular_admin_sees_nothing_deletable() {
    let mut app = TestApp::new();
    app.admin_session("ops@campus.edu", false).await;

    let resp = app.get("/admin/admins", None).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(
        resp.json
            .as_array()
            .unwrap()
            .iter()
            .all(|l| l["can_delete"] == false)
    );
}

// =============================================================================
// Adding
// =============================================================================

#[tokio::test]
async fn test_two_phase_add() {
    let mut app = TestApp::new();
    app.admin_session("root@campus.edu", true).await;
    let newcomer = app.user("newcomer@campus.edu").await;

    let verified = app
        .post(
            "/admin/admins/verify",
            None,
            json!({ "email": "Newcomer@Campus.edu" }),
        )
        .await;
    assert_eq!(verified.status, StatusCode::OK, "{}", verified.text);
    assert_eq!(verified.json["user_id"], json!(newcomer.user_id));
    assert_eq!(verified.json["email"], "newcomer@campus.edu");

    let created = app
        .post("/admin/admins", None, json!({ "role": "support" }))
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.text);
    assert_eq!(created.json["role"], "support");
    assert_eq!(created.json["is_active"], true);
    assert_eq!(created.json["is_master_admin"], false);

    // The candidate is consumed by the create
    let again = app
        .post("/admin/admins", None, json!({ "role": "support" }))
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_without_verify_is_bad_request() {
    let mut app = TestApp::new();
    app.admin_session("root@campus.edu", true).await;

    let resp = app
        .post("/admin/admins", None, json!({ "role": "admin" }))
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_unknown_email_is_not_found() {
    let mut app = TestApp::new();
    app.admin_session("root@campus.edu", true).await;

    let resp = app
        .post(
            "/admin/admins/verify",
            None,
            json!({ "email": "ghost@campus.edu" }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_verify_existing_admin_conflicts() {
    let mut app = TestApp::new();
    app.admin_session("root@campus.edu", true).await;
    let helper = app.user("helper@campus.edu").await;
    app.backend
        .add_admin_record(helper.user_id, AdminRole::Admin, true, false)
        .await;

    let resp = app
        .post(
            "/admin/admins/verify",
            None,
            json!({ "email": "helper@campus.edu" }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_regular_admin_cannot_manage() {
    let mut app = TestApp::new();
    app.admin_session("ops@campus.edu", false).await;
    app.user("newcomer@campus.edu").await;

    let resp = app
        .post(
            "/admin/admins/verify",
            None,
            json!({ "email": "newcomer@campus.edu" }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

// =============================================================================
// Updating and deleting
// =============================================================================

#[tokio::test]
async fn test_update_and_delete_other_admin() {
    let mut app = TestApp::new();
    app.admin_session("root@campus.edu", true).await;
    let helper = app.user("helper@campus.edu").await;
    let record = app
        .backend
        .add_admin_record(helper.user_id, AdminRole::Admin, true, false)
        .await;
    let uri = format!("/admin/admins/{}", record.id);

    let updated = app
        .patch(
            &uri,
            None,
            json!({ "role": "moderator", "is_active": false, "full_name": "Helper" }),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.text);
    assert_eq!(updated.json["role"], "moderator");
    assert_eq!(updated.json["is_active"], false);
    assert_eq!(updated.json["full_name"], "Helper");

    let deleted = app.delete(&uri, None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let listed = app.get("/admin/admins", None).await;
    assert_eq!(listed.json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_update_is_bad_request() {
    let mut app = TestApp::new();
    let master = app.admin_session("root@campus.edu", true).await;

    let resp = app
        .patch(&format!("/admin/admins/{}", master.id), None, json!({}))
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_master_cannot_delete_self() {
    let mut app = TestApp::new();
    let master = app.admin_session("root@campus.edu", true).await;

    let resp = app
        .delete(&format!("/admin/admins/{}", master.id), None)
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let dashboard = app.get("/admin/dashboard", None).await;
    assert_eq!(dashboard.status, StatusCode::OK);
}
