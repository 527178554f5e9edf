//! Domain models for the storefront service.
//!
//! These are the validated shapes the rest of the crate works with. Raw
//! backend rows are decoded in [`crate::backend::rows`] and converted here.

pub mod admin;
pub mod cart;
pub mod push;
pub mod session;

pub use admin::{AdminRecord, AdminUpdate, NewAdmin};
pub use cart::{CartItem, CartSnapshot, NewCartItem, ProductSummary, Variant};
pub use push::{DeliveryResult, NotificationPayload, PushSubscription, SubscriptionKeys};
pub use session::{Identity, keys as session_keys};
