//! Managed-backend access.
//!
//! The storefront owns no database. Carts, admins, push subscriptions and
//! authentication all live in a hosted backend that exposes REST tables,
//! remote procedures and an email OTP auth service, with row-level security
//! deciding what each caller may touch.
//!
//! # Seams
//!
//! Each concern is a trait so services can be exercised without the network:
//!
//! - [`CartStore`] - the `cart_items` and `products` tables
//! - [`AuthProvider`] - OTP sign-in and token resolution
//! - [`AdminDirectory`] - the `admins` table and its procedures
//! - [`SubscriptionStore`] - the `push_subscriptions` table
//!
//! [`Backend`] bundles all four. [`RemoteClient`] talks to the hosted service;
//! [`MemoryBackend`] keeps everything in process for tests and local runs.

pub mod memory;
pub mod remote;
pub mod rows;

use async_trait::async_trait;
use thiserror::Error;

use campus_market_core::{AccessToken, AdminId, Email, OtpCode, ProductId, UserId};

use crate::models::{
    AdminRecord, AdminUpdate, CartItem, Identity, NewAdmin, NewCartItem, ProductSummary,
    PushSubscription,
};

pub use memory::MemoryBackend;
pub use remote::RemoteClient;

/// Errors returned by the managed backend or while talking to it.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// A row did not match the expected schema.
    #[error("invalid row: {0}")]
    InvalidRow(String),

    /// Response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Backend URL could not be built.
    #[error("invalid backend URL: {0}")]
    Url(#[from] url::ParseError),
}

impl RemoteError {
    /// Whether the backend refused the request because of what the caller sent
    /// (bad or expired code, policy violation) rather than failing.
    #[must_use]
    pub const fn is_client_rejection(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status >= 400 && *status < 500)
    }
}

/// Per-user cart rows and the product catalogue they reference.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// All cart rows of the caller, oldest first.
    async fn fetch_cart(&self, who: &Identity) -> Result<Vec<CartItem>, RemoteError>;

    /// Insert one cart row.
    async fn insert_cart_item(&self, who: &Identity, item: &NewCartItem)
    -> Result<(), RemoteError>;

    /// Delete the caller's rows for a product.
    async fn delete_cart_item(&self, who: &Identity, product_id: ProductId)
    -> Result<(), RemoteError>;

    /// Set the quantity of the caller's row for a product.
    async fn update_cart_quantity(
        &self,
        who: &Identity,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RemoteError>;

    /// Delete every cart row of the caller.
    async fn clear_cart(&self, who: &Identity) -> Result<(), RemoteError>;

    /// Look up the cart-relevant fields of a product.
    async fn fetch_product(&self, product_id: ProductId)
    -> Result<Option<ProductSummary>, RemoteError>;
}

/// Email OTP authentication.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Email a one-time code. Never creates an account for unknown addresses.
    async fn send_otp(&self, email: &Email) -> Result<(), RemoteError>;

    /// Exchange a code for a signed-in identity.
    async fn verify_otp(&self, email: &Email, code: &OtpCode) -> Result<Identity, RemoteError>;

    /// Resolve a bearer token. `Ok(None)` when the token is not (or no longer) valid.
    async fn resolve_token(&self, token: &AccessToken) -> Result<Option<Identity>, RemoteError>;
}

/// The `admins` table and the procedures that mutate it.
///
/// Mutations run as the caller; the backend authorizes them against the
/// caller's own admin record.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    /// The admin record belonging to the caller, if any.
    async fn admin_for_user(&self, who: &Identity) -> Result<Option<AdminRecord>, RemoteError>;

    /// Every admin record visible to the caller.
    async fn list_admins(&self, who: &Identity) -> Result<Vec<AdminRecord>, RemoteError>;

    /// The auth user registered under an email address.
    async fn user_id_by_email(
        &self,
        who: &Identity,
        email: &Email,
    ) -> Result<Option<UserId>, RemoteError>;

    /// The admin record registered under an email address.
    async fn admin_by_email(
        &self,
        who: &Identity,
        email: &Email,
    ) -> Result<Option<AdminRecord>, RemoteError>;

    /// `add_admin` procedure.
    async fn add_admin(&self, who: &Identity, admin: &NewAdmin)
    -> Result<AdminRecord, RemoteError>;

    /// `update_admin` procedure.
    async fn update_admin(
        &self,
        who: &Identity,
        id: AdminId,
        update: &AdminUpdate,
    ) -> Result<AdminRecord, RemoteError>;

    /// `delete_admin` procedure.
    async fn delete_admin(&self, who: &Identity, id: AdminId) -> Result<(), RemoteError>;
}

/// Stored web-push subscriptions. Runs with service credentials.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert or replace the subscription with the same endpoint.
    async fn upsert_subscription(&self, subscription: &PushSubscription)
    -> Result<(), RemoteError>;

    /// Every subscription registered for a user.
    async fn subscriptions_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PushSubscription>, RemoteError>;
}

/// Everything the storefront needs from the managed backend.
#[async_trait]
pub trait Backend: CartStore + AuthProvider + AdminDirectory + SubscriptionStore {
    /// Cheap reachability check used by readiness.
    async fn ping(&self) -> Result<(), RemoteError>;
}
