//! Payment gateway webhook.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::OrderId;
use domain::PaymentOutcome;
use serde::{Deserialize, Serialize};
use store::Store;
use workflow::Settlement;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

/// Payment result posted by the gateway.
///
/// `transaction_id` and `amount` are accepted for logging; settlement is
/// driven by `order_id` and `status` alone.
#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    pub order_id: String,
    pub status: String,
    pub transaction_id: Option<String>,
    pub amount: Option<f64>,
}

#[derive(Serialize)]
pub struct WebhookResponse {
    pub order_id: String,
    pub status: String,
    pub applied: bool,
    pub message: String,
}

/// POST /payments/webhook: settle a pending order with a payment outcome.
#[tracing::instrument(
    skip(state, req),
    fields(order_id = %req.order_id, transaction_id = ?req.transaction_id)
)]
pub async fn webhook<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<WebhookRequest>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let order_id: OrderId = parse_id("order_id", &req.order_id)?;
    let outcome: PaymentOutcome = req
        .status
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid status: {e}")))?;
    if let Some(amount) = req.amount {
        tracing::debug!(amount, "gateway reported amount");
    }

    let settlement = state.settlement.settle(order_id, outcome).await?;
    let message = match settlement {
        Settlement::Applied(_) => "Webhook processed successfully",
        Settlement::AlreadySettled(_) => "Order already settled",
    };

    Ok(Json(WebhookResponse {
        order_id: order_id.to_string(),
        status: settlement.status().to_string(),
        applied: settlement.is_applied(),
        message: message.to_string(),
    }))
}
