//! Cart state synchronization.
//!
//! [`CartSynchronizer`] keeps an in-memory mirror of one user's remote cart
//! rows. It is not shared: [`worker`] gives every user a single task that owns
//! the synchronizer and applies commands strictly in order, so a reload can
//! never overtake a pending append.

mod error;
pub mod worker;

pub use error::CartError;
pub use worker::{CartHandle, CartRegistry};

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use campus_market_core::{Price, ProductId};

use crate::backend::CartStore;
use crate::models::{CartItem, CartSnapshot, Identity, NewCartItem, ProductSummary, Variant};

/// In-memory mirror of a user's cart.
pub struct CartSynchronizer<S: CartStore + ?Sized> {
    store: Arc<S>,
    owner: Option<Identity>,
    items: Vec<CartItem>,
    /// Lines added locally that remote reads have not returned yet.
    pending: Vec<CartItem>,
    loaded: bool,
}

impl<S: CartStore + ?Sized> CartSynchronizer<S> {
    /// Create an empty, unloaded synchronizer.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self {
            store,
            owner: None,
            items: Vec::new(),
            pending: Vec::new(),
            loaded: false,
        }
    }

    /// Replace local state with the remote rows of `identity`.
    ///
    /// Without an identity the cart is simply empty.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Remote`] if the rows cannot be fetched.
    pub async fn load(&mut self, identity: Option<Identity>) -> Result<(), CartError> {
        self.owner = identity;
        self.pending.clear();
        self.reload().await
    }

    /// Adopt a (possibly refreshed) identity for the next remote calls.
    ///
    /// A different user invalidates the mirror; the same user only swaps the
    /// access token.
    pub fn set_identity(&mut self, identity: Identity) {
        let same_user = self
            .owner
            .as_ref()
            .is_some_and(|owner| owner.user_id == identity.user_id);
        if !same_user {
            self.items.clear();
            self.pending.clear();
            self.loaded = false;
        }
        self.owner = Some(identity);
    }

    /// Fetch remote truth and replace the mirror.
    ///
    /// Optimistic lines the backend does not return yet are kept after the
    /// remote rows.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Remote`] if the rows cannot be fetched. The mirror
    /// is left untouched in that case.
    pub async fn reload(&mut self) -> Result<(), CartError> {
        let remote = match &self.owner {
            Some(owner) => self.store.fetch_cart(owner).await?,
            None => Vec::new(),
        };
        self.pending
            .retain(|p| !remote.iter().any(|r| r.product.id == p.product.id));
        self.items = remote;
        self.items.extend(self.pending.iter().cloned());
        self.loaded = true;
        Ok(())
    }

    /// Whether a load has completed since the last identity change.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Add a product to the cart.
    ///
    /// After the insert the mirror is reloaded; if the new row is not visible
    /// yet, the optimistic line is appended so the caller sees its own write.
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidQuantity`] if `quantity` is zero
    /// - [`CartError::DuplicateItem`] if the product is already in the cart
    /// - [`CartError::SignedOut`] without an identity
    /// - [`CartError::Remote`] if the insert or the reload fails
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add(
        &mut self,
        product: ProductSummary,
        variant: Variant,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity);
        }
        if self.contains(product.id) {
            return Err(CartError::DuplicateItem(product.id));
        }
        let owner = self.owner.as_ref().ok_or(CartError::SignedOut)?;

        let new_item = NewCartItem {
            user_id: owner.user_id,
            product_id: product.id,
            quantity,
            selected_color: variant.color.clone(),
            selected_size: variant.size.clone(),
        };
        self.store.insert_cart_item(owner, &new_item).await?;

        let optimistic = CartItem {
            product,
            quantity,
            selected_color: variant.color,
            selected_size: variant.size,
            added_at: Utc::now(),
        };

        self.pending.push(optimistic.clone());
        let reloaded = self.reload().await;
        if !self.contains(optimistic.product.id) {
            self.items.push(optimistic);
        }
        reloaded
    }

    /// Remove a product's line.
    ///
    /// Lines are keyed by product only, so the variant does not narrow the
    /// delete.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::SignedOut`] without an identity, or
    /// [`CartError::Remote`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn remove(
        &mut self,
        product_id: ProductId,
        variant: &Variant,
    ) -> Result<(), CartError> {
        let owner = self.owner.as_ref().ok_or(CartError::SignedOut)?;
        if variant != &Variant::none() {
            tracing::debug!(?variant, "variant ignored when removing cart line");
        }

        self.store.delete_cart_item(owner, product_id).await?;
        self.items.retain(|item| item.product.id != product_id);
        self.pending.retain(|item| item.product.id != product_id);
        Ok(())
    }

    /// Set a line's quantity. Anything below 1 removes the line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] if `quantity` does not fit a
    /// cart line, [`CartError::SignedOut`] without an identity, or
    /// [`CartError::Remote`] if the update fails.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &mut self,
        product_id: ProductId,
        quantity: i64,
        variant: &Variant,
    ) -> Result<(), CartError> {
        if quantity < 1 {
            return self.remove(product_id, variant).await;
        }
        let quantity = u32::try_from(quantity).map_err(|_| CartError::InvalidQuantity)?;
        let owner = self.owner.as_ref().ok_or(CartError::SignedOut)?;

        self.store
            .update_cart_quantity(owner, product_id, quantity)
            .await?;
        for item in self
            .items
            .iter_mut()
            .chain(self.pending.iter_mut())
            .filter(|item| item.product.id == product_id)
        {
            item.quantity = quantity;
        }
        Ok(())
    }

    /// Delete every line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::SignedOut`] without an identity, or
    /// [`CartError::Remote`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn clear(&mut self) -> Result<(), CartError> {
        let owner = self.owner.as_ref().ok_or(CartError::SignedOut)?;
        self.store.clear_cart(owner).await?;
        self.items.clear();
        self.pending.clear();
        Ok(())
    }

    /// Sum of quantities.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Sum of price times quantity.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Current lines, oldest first.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Owned view of the current state.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            items: self.items.clone(),
            count: self.count(),
            total: self.total(),
        }
    }

    fn contains(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|item| item.product.id == product_id)
    }
}
