//! Per-user single-writer cart queue.
//!
//! Each user gets one [`CartWorker`] task owning a [`CartSynchronizer`].
//! Requests reach it through a bounded channel and are applied one at a time
//! in arrival order; the reply carries the resulting snapshot.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use campus_market_core::{ProductId, UserId};

use super::{CartError, CartSynchronizer};
use crate::backend::CartStore;
use crate::models::{CartSnapshot, Identity, ProductSummary, Variant};

/// Pending commands per user before senders wait.
const QUEUE_DEPTH: usize = 32;

/// A cart operation.
#[derive(Debug)]
pub enum CartOp {
    Load,
    Add {
        product: ProductSummary,
        variant: Variant,
        quantity: u32,
    },
    Remove {
        product_id: ProductId,
        variant: Variant,
    },
    UpdateQuantity {
        product_id: ProductId,
        quantity: i64,
        variant: Variant,
    },
    Clear,
}

struct CartCommand {
    identity: Identity,
    op: CartOp,
    reply: oneshot::Sender<Result<CartSnapshot, CartError>>,
}

struct CartWorker<S: CartStore + ?Sized> {
    cart: CartSynchronizer<S>,
    rx: mpsc::Receiver<CartCommand>,
}

impl<S: CartStore + ?Sized> CartWorker<S> {
    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            let result = self.apply(command.identity, command.op).await;
            // The requester may have gone away; the change still happened.
            let _ = command.reply.send(result);
        }
        tracing::debug!("cart worker stopped");
    }

    async fn apply(&mut self, identity: Identity, op: CartOp) -> Result<CartSnapshot, CartError> {
        self.cart.set_identity(identity);
        if !self.cart.is_loaded() || matches!(op, CartOp::Load) {
            self.cart.reload().await?;
        }

        match op {
            CartOp::Load => {}
            CartOp::Add {
                product,
                variant,
                quantity,
            } => self.cart.add(product, variant, quantity).await?,
            CartOp::Remove {
                product_id,
                variant,
            } => self.cart.remove(product_id, &variant).await?,
            CartOp::UpdateQuantity {
                product_id,
                quantity,
                variant,
            } => {
                self.cart
                    .update_quantity(product_id, quantity, &variant)
                    .await?;
            }
            CartOp::Clear => self.cart.clear().await?,
        }

        Ok(self.cart.snapshot())
    }
}

/// Sending side of one user's cart worker.
#[derive(Clone)]
pub struct CartHandle {
    tx: mpsc::Sender<CartCommand>,
}

impl CartHandle {
    /// Spawn a worker for one user.
    fn spawn<S: CartStore + ?Sized + 'static>(store: Arc<S>, user_id: UserId) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let worker = CartWorker {
            cart: CartSynchronizer::new(store),
            rx,
        };
        tokio::spawn(
            worker
                .run()
                .instrument(tracing::debug_span!("cart_worker", %user_id)),
        );
        Self { tx }
    }

    /// Queue an operation and wait for its result.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::WorkerGone`] if the worker stopped, or whatever the
    /// operation itself failed with.
    pub async fn submit(&self, identity: Identity, op: CartOp) -> Result<CartSnapshot, CartError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(CartCommand {
                identity,
                op,
                reply,
            })
            .await
            .map_err(|_| CartError::WorkerGone)?;
        response.await.map_err(|_| CartError::WorkerGone)?
    }

    /// Current cart, reloaded from the backend.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit).
    pub async fn load(&self, identity: Identity) -> Result<CartSnapshot, CartError> {
        self.submit(identity, CartOp::Load).await
    }

    /// Add a product.
    ///
    /// # Errors
    ///
    /// See [`CartSynchronizer::add`].
    pub async fn add(
        &self,
        identity: Identity,
        product: ProductSummary,
        variant: Variant,
        quantity: u32,
    ) -> Result<CartSnapshot, CartError> {
        self.submit(
            identity,
            CartOp::Add {
                product,
                variant,
                quantity,
            },
        )
        .await
    }

    /// Remove a product's line.
    ///
    /// # Errors
    ///
    /// See [`CartSynchronizer::remove`].
    pub async fn remove(
        &self,
        identity: Identity,
        product_id: ProductId,
        variant: Variant,
    ) -> Result<CartSnapshot, CartError> {
        self.submit(
            identity,
            CartOp::Remove {
                product_id,
                variant,
            },
        )
        .await
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// See [`CartSynchronizer::update_quantity`].
    pub async fn update_quantity(
        &self,
        identity: Identity,
        product_id: ProductId,
        quantity: i64,
        variant: Variant,
    ) -> Result<CartSnapshot, CartError> {
        self.submit(
            identity,
            CartOp::UpdateQuantity {
                product_id,
                quantity,
                variant,
            },
        )
        .await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// See [`CartSynchronizer::clear`].
    pub async fn clear(&self, identity: Identity) -> Result<CartSnapshot, CartError> {
        self.submit(identity, CartOp::Clear).await
    }
}

/// One cart worker per user, created on first use.
///
/// Handles are only evicted after the configured idle period, never for
/// size, so a user with requests in flight keeps their one worker. Dropping
/// the last sender ends the worker once its queue drains.
pub struct CartRegistry<S: CartStore + ?Sized> {
    store: Arc<S>,
    workers: Cache<UserId, CartHandle>,
}

impl<S: CartStore + ?Sized + 'static> CartRegistry<S> {
    /// Create a registry whose workers use `store`.
    #[must_use]
    pub fn new(store: Arc<S>, idle: Duration) -> Self {
        Self {
            store,
            workers: Cache::builder()
                .time_to_idle(idle)
                .build(),
        }
    }

    /// The handle for `user_id`, spawning its worker if needed.
    pub async fn handle(&self, user_id: UserId) -> CartHandle {
        let store = Arc::clone(&self.store);
        self.workers
            .get_with(user_id, async move { CartHandle::spawn(store, user_id) })
            .await
    }
}

impl<S: CartStore + ?Sized> Clone for CartRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            workers: self.workers.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::backend::MemoryBackend;
    use campus_market_core::{Email, Price};

    fn product(name: &str) -> ProductSummary {
        ProductSummary {
            id: ProductId::random(),
            name: name.to_string(),
            price: Price::new(Decimal::new(300, 2)).unwrap(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_concurrent_adds_all_survive() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_delayed_visibility(true).await;
        let user_id = backend
            .add_user(&Email::parse("rush@campus.edu").unwrap())
            .await;
        let identity = backend.sign_in(user_id).await;

        let products: Vec<_> = (0..5).map(|i| product(&format!("item {i}"))).collect();
        for p in &products {
            backend.add_product(p.clone()).await;
        }

        let registry = CartRegistry::new(Arc::clone(&backend), Duration::from_secs(60));
        let handle = registry.handle(user_id).await;

        let tasks: Vec<_> = products
            .iter()
            .cloned()
            .map(|p| {
                let handle = handle.clone();
                let identity = identity.clone();
                tokio::spawn(async move { handle.add(identity, p, Variant::none(), 1).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let snapshot = handle.load(identity).await.unwrap();
        assert_eq!(snapshot.count, 5);
        assert_eq!(snapshot.total.amount(), Decimal::new(1500, 2));
    }

    #[tokio::test]
    async fn test_same_user_shares_worker_state() {
        let backend = Arc::new(MemoryBackend::new());
        let user_id = backend
            .add_user(&Email::parse("share@campus.edu").unwrap())
            .await;
        let identity = backend.sign_in(user_id).await;
        let lamp = product("lamp");
        backend.add_product(lamp.clone()).await;

        let registry = CartRegistry::new(Arc::clone(&backend), Duration::from_secs(60));
        registry
            .handle(user_id)
            .await
            .add(identity.clone(), lamp.clone(), Variant::none(), 1)
            .await
            .unwrap();

        let err = registry
            .handle(user_id)
            .await
            .add(identity, lamp, Variant::none(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::DuplicateItem(_)));
    }

    #[tokio::test]
    async fn test_worker_survives_other_users_traffic() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_delayed_visibility(true).await;
        let user_id = backend
            .add_user(&Email::parse("steady@campus.edu").unwrap())
            .await;
        let identity = backend.sign_in(user_id).await;
        let lamp = product("lamp");
        backend.add_product(lamp.clone()).await;

        let registry = CartRegistry::new(Arc::clone(&backend), Duration::from_secs(60));
        registry
            .handle(user_id)
            .await
            .add(identity.clone(), lamp, Variant::none(), 1)
            .await
            .unwrap();

        for _ in 0..500 {
            registry.handle(UserId::random()).await;
        }

        // The row is still invisible to reads; only the original worker's
        // pending line knows about it.
        let snapshot = registry.handle(user_id).await.load(identity).await.unwrap();
        assert_eq!(snapshot.count, 1);
    }
}
