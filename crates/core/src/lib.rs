//! Campus Market Core - Shared types library.
//!
//! This crate provides common types used across all Campus Market components:
//! - `storefront` - Cart, admin gate and push relay service
//! - `cli` - Command-line tools for operators
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no access to
//! the managed backend. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, OTP codes,
//!   access tokens and admin roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
