//! Domain error types.

use common::{OrderId, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors raised by the inventory ledger.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Reservations must be for at least one unit.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// No stock record exists for the product.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Not enough unreserved units to grant the reservation.
    #[error("Out of stock for product {product_id}: requested {requested}, available {available}")]
    OutOfStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A guarded deduct or release matched no row: the reservation backing
    /// the order line is missing or was already consumed.
    #[error("Insufficient reservation for order {order_id} on product {product_id}")]
    InsufficientReservation {
        order_id: OrderId,
        product_id: ProductId,
    },

    /// The order has no lines to deduct or release.
    #[error("Order {0} has no lines")]
    OrderHasNoLines(OrderId),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised while pricing an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// A line total or the order total does not fit in the money type.
    #[error("Price overflow on product {product_id}")]
    Overflow { product_id: ProductId },
}
