//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                      - Liveness
//! GET    /health/ready                - Readiness (pings the backend)
//!
//! # Cart (bearer token)
//! GET    /api/cart                    - Current cart
//! DELETE /api/cart                    - Empty the cart
//! POST   /api/cart/items              - Add a product
//! PATCH  /api/cart/items/{product_id} - Set quantity (below 1 removes)
//! DELETE /api/cart/items/{product_id} - Remove a product
//!
//! # Push
//! POST   /api/save-subscription       - Store a push subscription
//! POST   /api/send-notification       - Fan out to a user's subscriptions
//!
//! # Admin gate (session)
//! POST   /admin/otp/send              - Email a code
//! GET    /admin/otp/status            - Countdown and redirects
//! POST   /admin/otp/verify            - Submit the code
//! POST   /admin/logout                - Leave the admin area
//! GET    /admin/dashboard             - Re-validated admin info
//!
//! # Admin management (master admin)
//! GET    /admin/admins                - List admins
//! POST   /admin/admins/verify         - Phase one: check an email
//! POST   /admin/admins                - Phase two: create with a role
//! PATCH  /admin/admins/{id}           - Update
//! DELETE /admin/admins/{id}           - Delete
//! ```

pub mod admin;
pub mod cart;
pub mod health;
pub mod push;

use axum::{
    Router,
    http::{Method, header},
    middleware::from_fn,
    routing::{get, patch, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::{
    api_rate_limiter, create_session_layer, otp_rate_limiter,
    request_id::{make_request_span, request_id_middleware},
};
use crate::state::AppState;

/// Create the health routes router.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
}

/// Create the cart and push API router.
pub fn api_routes() -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/api/cart", get(cart::show).delete(cart::clear))
        .route("/api/cart/items", post(cart::add))
        .route(
            "/api/cart/items/{product_id}",
            patch(cart::update).delete(cart::remove),
        )
        .route("/api/save-subscription", post(push::save_subscription))
        .route("/api/send-notification", post(push::send_notification))
        .layer(cors)
}

/// Create the OTP routes router.
pub fn otp_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/otp/send", post(admin::send_code))
        .route("/admin/otp/verify", post(admin::verify_code))
}

/// Create the admin routes router (everything but the code endpoints).
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/otp/status", get(admin::status))
        .route("/admin/logout", post(admin::logout))
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/admins", get(admin::index).post(admin::create))
        .route("/admin/admins/verify", post(admin::verify_candidate))
        .route(
            "/admin/admins/{id}",
            patch(admin::update).delete(admin::delete),
        )
}

/// Full application without rate limiting.
///
/// Rate limiting keys on the client address, which in-process callers do not
/// have; [`app_with_rate_limits`] is what the server runs.
pub fn app(state: AppState) -> Router {
    compose(state, api_routes(), otp_routes())
}

/// Full application with per-IP rate limits on the API and code endpoints.
pub fn app_with_rate_limits(state: AppState) -> Router {
    compose(
        state,
        api_routes().layer(api_rate_limiter()),
        otp_routes().layer(otp_rate_limiter()),
    )
}

fn compose(state: AppState, api: Router<AppState>, otp: Router<AppState>) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .merge(health_routes())
        .merge(api)
        .merge(otp)
        .merge(admin_routes())
        .layer(session_layer)
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<axum::body::Body>))
        .with_state(state)
}
