//! Campus Market storefront library.
//!
//! Cart synchronization, the admin OTP gate and the web-push relay on top of
//! a managed backend, exposed as an axum application.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
