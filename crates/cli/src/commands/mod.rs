//! CLI command implementations.

pub mod notify;
pub mod subscriptions;

use campus_market_storefront::{
    backend::{RemoteClient, RemoteError},
    config::{ConfigError, StorefrontConfig},
    services::push::{DeliverError, PushError},
};
use thiserror::Error;

/// Errors shared by the commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] RemoteError),

    #[error("Push relay error: {0}")]
    Push(#[from] PushError),

    #[error("Delivery failed: {0}")]
    Deliver(#[from] DeliverError),
}

/// Load configuration and connect to the managed backend.
fn connect() -> Result<(StorefrontConfig, RemoteClient), CommandError> {
    let config = StorefrontConfig::from_env()?;
    let backend = RemoteClient::new(&config.backend)?;
    Ok((config, backend))
}
