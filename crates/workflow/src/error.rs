//! Workflow error types.

use common::{OrderId, ProductId, UserId};
use domain::{InventoryError, PricingError};
use store::StoreError;
use thiserror::Error;

/// Errors raised while filling a cart.
#[derive(Debug, Error)]
pub enum CartError {
    /// Cart rows must hold at least one unit.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// The product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The cart total cannot be represented.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by checkout. None of them leaves a partial effect behind.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The user's cart has no rows.
    #[error("Cart is empty for user {0}")]
    EmptyCart(UserId),

    /// A cart line refers to a product that no longer exists.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A cart line asks for more units than are available.
    #[error("Out of stock for product {product_id}: requested {requested}, available {available}")]
    OutOfStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Any other inventory failure.
    #[error("Inventory error: {0}")]
    Inventory(InventoryError),

    /// The order total cannot be represented.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<InventoryError> for CheckoutError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::ProductNotFound(product_id) => CheckoutError::ProductNotFound(product_id),
            InventoryError::OutOfStock {
                product_id,
                requested,
                available,
            } => CheckoutError::OutOfStock {
                product_id,
                requested,
                available,
            },
            InventoryError::Store(e) => CheckoutError::Store(e),
            other => CheckoutError::Inventory(other),
        }
    }
}

/// Errors raised while settling a payment. The order stays pending after
/// any of them.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// No order with this id exists.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A line's reservation is missing or already consumed.
    #[error("Insufficient reservation for order {order_id} on product {product_id}")]
    InsufficientReservation {
        order_id: OrderId,
        product_id: ProductId,
    },

    /// Any other inventory failure.
    #[error("Inventory error: {0}")]
    Inventory(InventoryError),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<InventoryError> for SettlementError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InsufficientReservation {
                order_id,
                product_id,
            } => SettlementError::InsufficientReservation {
                order_id,
                product_id,
            },
            InventoryError::Store(e) => SettlementError::Store(e),
            other => SettlementError::Inventory(other),
        }
    }
}
