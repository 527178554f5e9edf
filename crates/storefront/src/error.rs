//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client with a JSON `{"error": ...}` body. All
//! route handlers return `Result<T, AppError>`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::backend::RemoteError;
use crate::services::admin::{EditorError, GateError};
use crate::services::cart::CartError;
use crate::services::push::DeliverError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Admin gate transition failed.
    #[error("Admin gate error: {0}")]
    Gate(#[from] GateError),

    /// Admin record management failed.
    #[error("Admin editor error: {0}")]
    Editor(#[from] EditorError),

    /// Push fan-out failed.
    #[error("Push error: {0}")]
    Deliver(#[from] DeliverError),

    /// Managed backend call failed.
    #[error("Backend error: {0}")]
    Remote(#[from] RemoteError),

    /// Request body was missing, not JSON, or did not match the schema.
    #[error("Invalid request body: {0}")]
    Json(#[from] JsonRejection),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but lacks the capability.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Cart(err) => match err {
                CartError::DuplicateItem(_) => StatusCode::CONFLICT,
                CartError::InvalidQuantity => StatusCode::BAD_REQUEST,
                CartError::SignedOut => StatusCode::UNAUTHORIZED,
                CartError::ProductNotFound(_) => StatusCode::NOT_FOUND,
                CartError::WorkerGone | CartError::Remote(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Gate(err) => match err {
                GateError::InvalidEmail(_)
                | GateError::InvalidCode(_)
                | GateError::NoPendingChallenge
                | GateError::SendRejected => StatusCode::BAD_REQUEST,
                GateError::Expired => StatusCode::GONE,
                GateError::AlreadyAuthorized => StatusCode::CONFLICT,
                GateError::CodeRejected | GateError::NotAuthorized => StatusCode::UNAUTHORIZED,
                GateError::Remote(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Editor(err) => match err {
                EditorError::InvalidEmail(_) | EditorError::EmptyUpdate => StatusCode::BAD_REQUEST,
                EditorError::UnknownUser(_) => StatusCode::NOT_FOUND,
                EditorError::AlreadyAdmin(_) => StatusCode::CONFLICT,
                // Procedures authorize server-side; reflect their refusals.
                EditorError::Remote(RemoteError::Api { status: 400, .. }) => StatusCode::BAD_REQUEST,
                EditorError::Remote(RemoteError::Api { status: 403, .. }) => StatusCode::FORBIDDEN,
                EditorError::Remote(RemoteError::Api { status: 404, .. }) => StatusCode::NOT_FOUND,
                EditorError::Remote(RemoteError::Api { status: 409, .. }) => StatusCode::CONFLICT,
                EditorError::Remote(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Deliver(err) => match err {
                DeliverError::NoSubscriptions(_) => StatusCode::NOT_FOUND,
                DeliverError::Remote(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Remote(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::Json(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Client-facing message. Server errors never expose details.
    fn client_message(&self) -> String {
        if self.status().is_server_error() {
            return "Internal server error".to_string();
        }
        match self {
            Self::Cart(err) => err.to_string(),
            Self::Gate(err) => err.to_string(),
            Self::Editor(EditorError::Remote(_)) => "The change was refused".to_string(),
            Self::Editor(err) => err.to_string(),
            Self::Deliver(DeliverError::NoSubscriptions(_)) => {
                "No subscriptions found for user".to_string()
            }
            Self::Json(rejection) => rejection.body_text(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg) => msg.clone(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let message = self.client_message();
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
