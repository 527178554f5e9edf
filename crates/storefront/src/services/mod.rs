//! Business logic services for the storefront.
//!
//! # Services
//!
//! - [`cart`] - per-user cart mirror behind a single-writer queue
//! - [`admin`] - OTP-gated admin access and admin record management
//! - [`push`] - web-push fan-out through the relay

pub mod admin;
pub mod cart;
pub mod push;
