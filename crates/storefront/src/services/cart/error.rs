//! Cart error types.

use thiserror::Error;

use campus_market_core::ProductId;

use crate::backend::RemoteError;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product already has a line in the cart.
    #[error("product {0} is already in the cart")]
    DuplicateItem(ProductId),

    /// A line must hold at least one unit.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// Mutations need a signed-in user.
    #[error("sign in to change your cart")]
    SignedOut,

    /// The product does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The user's cart worker stopped.
    #[error("cart worker is gone")]
    WorkerGone,

    /// Backend call failed.
    #[error("backend error: {0}")]
    Remote(#[from] RemoteError),
}
