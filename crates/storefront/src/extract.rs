//! Request extractors with storefront error handling.

use axum::extract::FromRequest;

use crate::error::AppError;

/// JSON request body whose rejections surface as [`AppError`].
///
/// axum's own `Json` answers a wrong content type with 415 and a schema
/// mismatch with 422; here every unusable body is a 400 with the usual
/// `{"error": ...}` payload.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);
