//! Cart API tests.
//!
//! Every request runs the full router against the in-memory backend; the
//! caller is identified by a bearer token issued by that backend.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use campus_market_integration_tests::TestApp;
use campus_market_storefront::backend::memory::Fault;

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_anonymous_cart_is_empty() {
    let mut app = TestApp::new();

    let resp = app.get("/api/cart", None).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["count"], 0);
    assert_eq!(resp.json["items"], json!([]));
}

#[tokio::test]
async fn test_mutation_without_token_is_unauthorized() {
    let mut app = TestApp::new();
    let lamp = app.product("Desk lamp", 1500).await;

    let resp = app
        .post("/api/cart/items", None, json!({ "product_id": lamp }))
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert!(resp.json["error"].is_string());
}

// =============================================================================
// Mutations
// =============================================================================

#[tokio::test]
async fn test_add_then_show() {
    let mut app = TestApp::new();
    let alice = app.user("alice@campus.edu").await;
    let lamp = app.product("Desk lamp", 1500).await;

    let added = app
        .post(
            "/api/cart/items",
            Some(&alice),
            json!({ "product_id": lamp, "quantity": 2, "color": "white" }),
        )
        .await;
    assert_eq!(added.status, StatusCode::CREATED, "{}", added.text);
    assert_eq!(added.json["count"], 2);
    assert_eq!(added.json["items"][0]["selected_color"], "white");

    let shown = app.get("/api/cart", Some(&alice)).await;
    assert_eq!(shown.status, StatusCode::OK);
    assert_eq!(shown.json["count"], 2);
    assert_eq!(shown.json["items"][0]["product"]["name"], "Desk lamp");
}

#[tokio::test]
async fn test_duplicate_add_conflicts() {
    let mut app = TestApp::new();
    let alice = app.user("alice@campus.edu").await;
    let lamp = app.product("Desk lamp", 1500).await;
    let body = json!({ "product_id": lamp });

    let first = app.post("/api/cart/items", Some(&alice), body.clone()).await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = app.post("/api/cart/items", Some(&alice), body).await;
    assert_eq!(second.status, StatusCode::CONFLICT);

    let shown = app.get("/api/cart", Some(&alice)).await;
    assert_eq!(shown.json["count"], 1);
    assert_eq!(app.backend.cart_row_count(alice.user_id).await, 1);
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let mut app = TestApp::new();
    let alice = app.user("alice@campus.edu").await;

    let resp = app
        .post(
            "/api/cart/items",
            Some(&alice),
            json!({ "product_id": "7a1f9d0e-2c8b-4e4f-9b7a-0d6c5e4f3a21" }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_zero_quantity_add_is_bad_request() {
    let mut app = TestApp::new();
    let alice = app.user("alice@campus.edu").await;
    let lamp = app.product("Desk lamp", 1500).await;

    let resp = app
        .post(
            "/api/cart/items",
            Some(&alice),
            json!({ "product_id": lamp, "quantity": 0 }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_quantity_and_total() {
    let mut app = TestApp::new();
    let alice = app.user("alice@campus.edu").await;
    let lamp = app.product("Desk lamp", 1500).await;
    let mug = app.product("Mug", 550).await;

    app.post("/api/cart/items", Some(&alice), json!({ "product_id": lamp }))
        .await;
    app.post("/api/cart/items", Some(&alice), json!({ "product_id": mug }))
        .await;

    let resp = app
        .patch(
            &format!("/api/cart/items/{mug}"),
            Some(&alice),
            json!({ "quantity": 3 }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text);
    assert_eq!(resp.json["count"], 4);
    assert_eq!(resp.json["total"], "31.50");
}

#[tokio::test]
async fn test_update_to_zero_removes_line() {
    let mut app = TestApp::new();
    let alice = app.user("alice@campus.edu").await;
    let lamp = app.product("Desk lamp", 1500).await;

    app.post("/api/cart/items", Some(&alice), json!({ "product_id": lamp }))
        .await;
    let resp = app
        .patch(
            &format!("/api/cart/items/{lamp}"),
            Some(&alice),
            json!({ "quantity": 0 }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["count"], 0);
    assert_eq!(app.backend.cart_row_count(alice.user_id).await, 0);
}

#[tokio::test]
async fn test_oversized_quantity_is_bad_request() {
    let mut app = TestApp::new();
    let alice = app.user("alice@campus.edu").await;
    let lamp = app.product("Desk lamp", 1500).await;

    app.post("/api/cart/items", Some(&alice), json!({ "product_id": lamp }))
        .await;
    let resp = app
        .patch(
            &format!("/api/cart/items/{lamp}"),
            Some(&alice),
            json!({ "quantity": 5_000_000_000_i64 }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.backend.cart_row_count(alice.user_id).await, 1);

    let shown = app.get("/api/cart", Some(&alice)).await;
    assert_eq!(shown.json["count"], 1);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let mut app = TestApp::new();
    let alice = app.user("alice@campus.edu").await;

    let resp = app
        .post(
            "/api/cart/items",
            Some(&alice),
            json!({ "product_id": "lamp", "quantity": 1 }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.json["error"].is_string());
}

#[tokio::test]
async fn test_remove_and_clear() {
    let mut app = TestApp::new();
    let alice = app.user("alice@campus.edu").await;
    let lamp = app.product("Desk lamp", 1500).await;
    let mug = app.product("Mug", 550).await;

    app.post("/api/cart/items", Some(&alice), json!({ "product_id": lamp }))
        .await;
    app.post("/api/cart/items", Some(&alice), json!({ "product_id": mug }))
        .await;

    let removed = app
        .delete(&format!("/api/cart/items/{lamp}?color=red"), Some(&alice))
        .await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.json["items"].as_array().unwrap().len(), 1);

    let cleared = app.delete("/api/cart", Some(&alice)).await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert_eq!(cleared.json["count"], 0);
}

// =============================================================================
// Isolation and consistency
// =============================================================================

#[tokio::test]
async fn test_carts_are_per_user() {
    let mut app = TestApp::new();
    let alice = app.user("alice@campus.edu").await;
    let bob = app.user("bob@campus.edu").await;
    let lamp = app.product("Desk lamp", 1500).await;

    app.post("/api/cart/items", Some(&alice), json!({ "product_id": lamp }))
        .await;

    let bobs = app.get("/api/cart", Some(&bob)).await;
    assert_eq!(bobs.json["count"], 0);

    let added = app
        .post("/api/cart/items", Some(&bob), json!({ "product_id": lamp }))
        .await;
    assert_eq!(added.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_added_line_survives_lagging_read() {
    let mut app = TestApp::new();
    let alice = app.user("alice@campus.edu").await;
    let lamp = app.product("Desk lamp", 1500).await;
    app.backend.set_delayed_visibility(true).await;

    let added = app
        .post("/api/cart/items", Some(&alice), json!({ "product_id": lamp }))
        .await;

    assert_eq!(added.status, StatusCode::CREATED);
    assert_eq!(added.json["count"], 1);
}

#[tokio::test]
async fn test_backend_failure_is_internal_error() {
    let mut app = TestApp::new();
    let alice = app.user("alice@campus.edu").await;
    let lamp = app.product("Desk lamp", 1500).await;
    app.backend.inject_fault(Fault::InsertCart).await;

    let resp = app
        .post("/api/cart/items", Some(&alice), json!({ "product_id": lamp }))
        .await;

    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!resp.text.contains("injected"));
}

#[tokio::test]
async fn test_cart_read_failure_is_internal_error() {
    let mut app = TestApp::new();
    let alice = app.user("alice@campus.edu").await;
    app.backend.inject_fault(Fault::FetchCart).await;

    let resp = app.get("/api/cart", Some(&alice)).await;

    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.json["error"], "Internal server error");
}
