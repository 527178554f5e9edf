//! Cart domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campus_market_core::{Price, ProductId, UserId};

/// The product fields a cart line needs to render and total itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub image_url: Option<String>,
}

/// Optional color/size selection attached to a cart line.
///
/// Stored with the line but not part of its identity: a cart holds at most one
/// line per product regardless of variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub color: Option<String>,
    pub size: Option<String>,
}

impl Variant {
    /// A variant with neither color nor size selected.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            color: None,
            size: None,
        }
    }
}

/// One line in a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: ProductSummary,
    /// Always at least 1; a line whose quantity would drop below 1 is removed.
    pub quantity: u32,
    pub selected_color: Option<String>,
    pub selected_size: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Price of this line (unit price times quantity).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.line_total(self.quantity)
    }
}

/// Insert payload for a new cart row.
#[derive(Debug, Clone, Serialize)]
pub struct NewCartItem {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub selected_color: Option<String>,
    pub selected_size: Option<String>,
}

/// Read-only view of a cart returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSnapshot {
    pub items: Vec<CartItem>,
    pub count: u32,
    pub total: Price,
}

impl CartSnapshot {
    /// Snapshot of an empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            total: Price::ZERO,
        }
    }
}
