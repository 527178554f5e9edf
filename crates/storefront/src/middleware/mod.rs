//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions, in-memory store)
//! 5. Rate limiting (governor) on the OTP and API routes

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{
    BearerIdentity, RequireAdmin, RequireIdentity, RequireMasterAdmin, load_gate, store_gate,
};
pub use rate_limit::{api_rate_limiter, otp_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use session::create_session_layer;
