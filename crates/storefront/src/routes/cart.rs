//! Cart API handlers.
//!
//! Every mutation goes through the caller's cart worker, so requests from the
//! same user are applied one at a time in arrival order.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use campus_market_core::ProductId;

use crate::error::{Result, add_breadcrumb};
use crate::extract::JsonBody;
use crate::middleware::{BearerIdentity, RequireIdentity};
use crate::models::{CartSnapshot, Variant};
use crate::services::cart::CartError;
use crate::state::AppState;

/// Body of `POST /api/cart/items`.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub color: Option<String>,
    pub size: Option<String>,
}

const fn default_quantity() -> u32 {
    1
}

/// Body of `PATCH /api/cart/items/{product_id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
    pub color: Option<String>,
    pub size: Option<String>,
}

/// Optional variant on `DELETE /api/cart/items/{product_id}`.
#[derive(Debug, Default, Deserialize)]
pub struct VariantQuery {
    pub color: Option<String>,
    pub size: Option<String>,
}

impl From<VariantQuery> for Variant {
    fn from(q: VariantQuery) -> Self {
        Self {
            color: q.color,
            size: q.size,
        }
    }
}

/// Current cart. Empty for anonymous callers.
///
/// GET /api/cart
#[instrument(skip(state, identity))]
pub async fn show(
    State(state): State<AppState>,
    BearerIdentity(identity): BearerIdentity,
) -> Result<Json<CartSnapshot>> {
    let Some(identity) = identity else {
        return Ok(Json(CartSnapshot::empty()));
    };
    let snapshot = state
        .carts()
        .handle(identity.user_id)
        .await
        .load(identity)
        .await?;
    Ok(Json(snapshot))
}

/// Add a product.
///
/// POST /api/cart/items
#[instrument(skip(state, identity), fields(user_id = %identity.user_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
    JsonBody(req): JsonBody<AddItemRequest>,
) -> Result<(StatusCode, Json<CartSnapshot>)> {
    let product = state
        .backend()
        .fetch_product(req.product_id)
        .await?
        .ok_or(CartError::ProductNotFound(req.product_id))?;

    let product_id = product.id.to_string();
    let snapshot = state
        .carts()
        .handle(identity.user_id)
        .await
        .add(
            identity,
            product,
            Variant {
                color: req.color,
                size: req.size,
            },
            req.quantity,
        )
        .await?;

    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", product_id.as_str())]));
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Set a line's quantity; below 1 removes it.
///
/// PATCH /api/cart/items/{product_id}
#[instrument(skip(state, identity), fields(user_id = %identity.user_id))]
pub async fn update(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
    Path(product_id): Path<ProductId>,
    JsonBody(req): JsonBody<UpdateItemRequest>,
) -> Result<Json<CartSnapshot>> {
    let snapshot = state
        .carts()
        .handle(identity.user_id)
        .await
        .update_quantity(
            identity,
            product_id,
            req.quantity,
            Variant {
                color: req.color,
                size: req.size,
            },
        )
        .await?;
    Ok(Json(snapshot))
}

/// Remove a product's line.
///
/// DELETE /api/cart/items/{product_id}
#[instrument(skip(state, identity), fields(user_id = %identity.user_id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
    Path(product_id): Path<ProductId>,
    Query(variant): Query<VariantQuery>,
) -> Result<Json<CartSnapshot>> {
    let snapshot = state
        .carts()
        .handle(identity.user_id)
        .await
        .remove(identity, product_id, variant.into())
        .await?;
    Ok(Json(snapshot))
}

/// Empty the cart.
///
/// DELETE /api/cart
#[instrument(skip(state, identity), fields(user_id = %identity.user_id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
) -> Result<Json<CartSnapshot>> {
    let snapshot = state
        .carts()
        .handle(identity.user_id)
        .await
        .clear(identity)
        .await?;
    Ok(Json(snapshot))
}
