//! Checkout and order query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};
use store::{OrderLine, OrderRecord, Store};
use workflow::OrderDetails;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub user_id: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderPlacedResponse {
    pub order_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub total_price_cents: i64,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<OrderLineResponse>>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl OrderResponse {
    fn from_record(order: OrderRecord, lines: Option<Vec<OrderLine>>) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            status: order.status.to_string(),
            total_price_cents: order.total_price.cents(),
            created_at: order.created_at.to_rfc3339(),
            lines: lines.map(|lines| {
                lines
                    .into_iter()
                    .map(|line| OrderLineResponse {
                        product_id: line.product_id.to_string(),
                        quantity: line.quantity,
                        unit_price_cents: line.unit_price.cents(),
                    })
                    .collect()
            }),
        }
    }
}

impl From<OrderDetails> for OrderResponse {
    fn from(details: OrderDetails) -> Self {
        Self::from_record(details.order, Some(details.lines))
    }
}

// -- Handlers --

/// POST /orders: check out the user's cart into a pending order.
#[tracing::instrument(skip(state, req))]
pub async fn checkout<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError> {
    let user_id: UserId = parse_id("user_id", &req.user_id)?;
    let placed = state.checkout.checkout(user_id).await?;

    let response = OrderPlacedResponse {
        order_id: placed.order_id.to_string(),
        status: placed.status.to_string(),
        message: "Order created successfully. Proceed to payment.".to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders/{id}: an order with its lines.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id("order id", &id)?;
    let details = state
        .orders
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {order_id} not found")))?;

    Ok(Json(details.into()))
}

/// GET /users/{user_id}/orders: a user's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_for_user<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let user_id: UserId = parse_id("user_id", &user_id)?;
    let orders = state.orders.orders_for_user(user_id).await?;

    Ok(Json(
        orders
            .into_iter()
            .map(|order| OrderResponse::from_record(order, None))
            .collect(),
    ))
}
