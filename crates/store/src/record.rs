//! Row types persisted by the store.

use chrono::{DateTime, Utc};
use common::{LineId, Money, OrderId, OrderStatus, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// A product together with its stock record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    /// Total units owned.
    pub stock: u32,
    /// Units earmarked for pending orders. Never exceeds `stock`.
    pub reserved_stock: u32,
}

impl Product {
    /// Creates a product with nothing reserved.
    pub fn new(name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            price,
            stock,
            reserved_stock: 0,
        }
    }

    /// Units that can still be reserved.
    pub fn available(&self) -> u32 {
        self.stock.saturating_sub(self.reserved_stock)
    }
}

/// Stock counters read under a row lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub stock: u32,
    pub reserved_stock: u32,
}

impl StockLevel {
    /// Units that can still be reserved.
    pub fn available(&self) -> u32 {
        self.stock.saturating_sub(self.reserved_stock)
    }
}

/// A row in a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: LineId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    pub fn new(user_id: UserId, product_id: ProductId, quantity: u32) -> Self {
        Self {
            id: LineId::new(),
            user_id,
            product_id,
            quantity,
            created_at: Utc::now(),
        }
    }
}

/// A cart row joined with the product's name and current price.
///
/// The price is the snapshot checkout charges for, so it is read once and
/// never re-derived later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Id of the underlying cart row.
    pub item_id: LineId,
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl CartLine {
    /// Returns `unit_price * quantity`, or None if it overflows.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

/// An order row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: UserId,
    pub total_price: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// A line of an order with the unit price copied at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: LineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub unit_price: Money,
    pub quantity: u32,
}
