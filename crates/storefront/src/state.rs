//! Application state shared across handlers.

use std::sync::Arc;

use crate::backend::{Backend, RemoteClient, RemoteError};
use crate::config::StorefrontConfig;
use crate::services::cart::CartRegistry;
use crate::services::push::{PushError, PushSender, RelayPushSender};

/// Error creating application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("backend client: {0}")]
    Backend(#[from] RemoteError),
    #[error("push relay client: {0}")]
    Push(#[from] PushError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// managed backend, the push relay and the per-user cart workers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: Arc<dyn Backend>,
    push: Arc<dyn PushSender>,
    carts: CartRegistry<dyn Backend>,
}

impl AppState {
    /// Create application state talking to the configured services.
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be built from the configuration.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let backend: Arc<dyn Backend> = Arc::new(RemoteClient::new(&config.backend)?);
        let push: Arc<dyn PushSender> = Arc::new(RelayPushSender::new(&config.push)?);
        Ok(Self::from_parts(config, backend, push))
    }

    /// Create application state from explicit collaborators.
    #[must_use]
    pub fn from_parts(
        config: StorefrontConfig,
        backend: Arc<dyn Backend>,
        push: Arc<dyn PushSender>,
    ) -> Self {
        let carts = CartRegistry::new(Arc::clone(&backend), config.cart_idle);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                push,
                carts,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the managed backend.
    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.inner.backend.as_ref()
    }

    /// Get a reference to the push relay.
    #[must_use]
    pub fn push(&self) -> &dyn PushSender {
        self.inner.push.as_ref()
    }

    /// Get a reference to the cart worker registry.
    #[must_use]
    pub fn carts(&self) -> &CartRegistry<dyn Backend> {
        &self.inner.carts
    }
}
