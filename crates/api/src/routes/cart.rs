//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};
use store::{CartItem, Store};
use workflow::Cart;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub user_id: String,
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct CartLineResponse {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub user_id: String,
    pub lines: Vec<CartLineResponse>,
    pub total_cents: i64,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            user_id: cart.user_id.to_string(),
            lines: cart
                .lines
                .into_iter()
                .map(|line| CartLineResponse {
                    product_id: line.product_id.to_string(),
                    name: line.name,
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                })
                .collect(),
            total_cents: cart.total.cents(),
        }
    }
}

/// POST /cart: add a product to a user's cart.
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartItem>), ApiError> {
    let user_id: UserId = parse_id("user_id", &req.user_id)?;
    let product_id: ProductId = parse_id("product_id", &req.product_id)?;

    let item = state.cart.add_item(user_id, product_id, req.quantity).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /cart/{user_id}: a user's cart at current prices.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let user_id: UserId = parse_id("user_id", &user_id)?;
    let cart = state.cart.cart(user_id).await?;
    Ok(Json(cart.into()))
}
