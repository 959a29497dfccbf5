//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::InventoryError;
use store::StoreError;
use workflow::{CartError, CheckoutError, SettlementError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Cart operation error.
    Cart(CartError),
    /// Checkout error.
    Checkout(CheckoutError),
    /// Settlement error.
    Settlement(SettlementError),
    /// Storage error outside the workflows.
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Cart(err) => (cart_status(&err), err.to_string()),
            ApiError::Checkout(err) => (checkout_status(&err), err.to_string()),
            ApiError::Settlement(err) => (settlement_status(&err), err.to_string()),
            ApiError::Store(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn cart_status(err: &CartError) -> StatusCode {
    match err {
        CartError::InvalidQuantity { .. } => StatusCode::BAD_REQUEST,
        CartError::ProductNotFound(_) => StatusCode::NOT_FOUND,
        CartError::Pricing(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CartError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::EmptyCart(_) => StatusCode::BAD_REQUEST,
        CheckoutError::ProductNotFound(_) => StatusCode::NOT_FOUND,
        CheckoutError::OutOfStock { .. } => StatusCode::CONFLICT,
        CheckoutError::Inventory(inner) => inventory_status(inner),
        CheckoutError::Pricing(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CheckoutError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn settlement_status(err: &SettlementError) -> StatusCode {
    match err {
        SettlementError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        SettlementError::InsufficientReservation { .. } => StatusCode::CONFLICT,
        SettlementError::Inventory(inner) => inventory_status(inner),
        SettlementError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn inventory_status(err: &InventoryError) -> StatusCode {
    match err {
        InventoryError::InvalidQuantity { .. } => StatusCode::BAD_REQUEST,
        InventoryError::ProductNotFound(_) => StatusCode::NOT_FOUND,
        InventoryError::OutOfStock { .. }
        | InventoryError::InsufficientReservation { .. }
        | InventoryError::OrderHasNoLines(_) => StatusCode::CONFLICT,
        InventoryError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::Cart(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        ApiError::Settlement(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
