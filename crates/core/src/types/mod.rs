//! Core types for Campus Market.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod otp;
pub mod price;
pub mod role;
pub mod token;

pub use email::{Email, EmailError};
pub use id::*;
pub use otp::{OtpCode, OtpCodeError};
pub use price::{NegativePrice, Price};
pub use role::AdminRole;
pub use token::AccessToken;
