//! Wire shapes of backend rows and their validation.
//!
//! Rows are decoded into these loose structs first and then converted into
//! domain types, so a malformed row becomes [`RemoteError::InvalidRow`]
//! instead of a half-valid value.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use campus_market_core::{AccessToken, Email, Price, ProductId, UserId};

use super::RemoteError;
use crate::models::{CartItem, Identity, ProductSummary};

/// Columns selected from `products`.
pub const PRODUCT_COLUMNS: &str = "id,name,price,image_url";

/// Columns selected from `cart_items`, with the embedded product.
pub const CART_COLUMNS: &str =
    "product_id,quantity,selected_color,selected_size,added_at,products(id,name,price,image_url)";

/// A `products` row.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductRow {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub image_url: Option<String>,
}

impl TryFrom<ProductRow> for ProductSummary {
    type Error = RemoteError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let price = Price::new(row.price)
            .map_err(|e| RemoteError::InvalidRow(format!("product {}: {e}", row.id)))?;

        Ok(Self {
            id: row.id,
            name: row.name,
            price,
            image_url: row.image_url,
        })
    }
}

/// A `cart_items` row with its product embedded.
#[derive(Debug, Clone, Deserialize)]
pub struct CartRow {
    pub product_id: ProductId,
    pub quantity: i64,
    pub selected_color: Option<String>,
    pub selected_size: Option<String>,
    pub added_at: DateTime<Utc>,
    pub products: Option<ProductRow>,
}

impl TryFrom<CartRow> for CartItem {
    type Error = RemoteError;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity)
            .ok()
            .filter(|q| *q >= 1)
            .ok_or_else(|| {
                RemoteError::InvalidRow(format!(
                    "cart line for product {} has quantity {}",
                    row.product_id, row.quantity
                ))
            })?;

        let product = row.products.ok_or_else(|| {
            RemoteError::InvalidRow(format!(
                "cart line references missing product {}",
                row.product_id
            ))
        })?;

        Ok(Self {
            product: ProductSummary::try_from(product)?,
            quantity,
            selected_color: row.selected_color,
            selected_size: row.selected_size,
            added_at: row.added_at,
        })
    }
}

/// User object returned by the auth service.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Option<String>,
}

/// Successful response of the OTP verify endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    pub access_token: String,
    pub user: AuthUser,
}

impl AuthUser {
    /// Build an identity for this user holding `token`.
    ///
    /// An unparseable email is dropped rather than rejected: the user id is
    /// what identifies the caller.
    #[must_use]
    pub fn into_identity(self, token: AccessToken) -> Identity {
        Identity {
            user_id: self.id,
            email: self.email.as_deref().and_then(|e| Email::parse(e).ok()),
            access_token: token,
        }
    }
}
