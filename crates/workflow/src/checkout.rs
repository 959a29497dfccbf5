//! Checkout: cart to pending order.

use std::time::Instant;

use chrono::Utc;
use common::{LineId, Money, OrderId, OrderStatus, UserId};
use domain::{InventoryLedger, total_price};
use serde::Serialize;
use store::{OrderLine, OrderRecord, Store, Transaction};

use crate::error::CheckoutError;

/// The result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_price: Money,
    pub lines: Vec<OrderLine>,
}

/// Turns a user's cart into a pending order.
///
/// Everything happens in one transaction: the cart rows are read and locked,
/// stock is reserved for every line, the order and its lines are written and
/// the rows read are deleted. Any failure rolls all of it back, so a checkout either fully
/// happens or leaves no trace.
pub struct CheckoutOrchestrator<S: Store> {
    store: S,
}

impl<S: Store> CheckoutOrchestrator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places an order for everything in the user's cart.
    #[tracing::instrument(skip(self))]
    pub async fn checkout(&self, user_id: UserId) -> Result<PlacedOrder, CheckoutError> {
        metrics::counter!("checkouts_total").increment(1);
        let start = Instant::now();

        let result = self.run(user_id).await;

        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());
        match &result {
            Ok(placed) => tracing::info!(
                order_id = %placed.order_id,
                total_price = %placed.total_price,
                lines = placed.lines.len(),
                "order placed"
            ),
            Err(e) => {
                metrics::counter!("checkout_failures_total", "reason" => failure_reason(e))
                    .increment(1);
                tracing::warn!(error = %e, "checkout failed");
            }
        }
        result
    }

    async fn run(&self, user_id: UserId) -> Result<PlacedOrder, CheckoutError> {
        let mut tx = self.store.begin().await?;
        match place(tx.as_mut(), user_id).await {
            Ok(placed) => {
                tx.commit().await?;
                Ok(placed)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

async fn place(tx: &mut dyn Transaction, user_id: UserId) -> Result<PlacedOrder, CheckoutError> {
    // Locks the cart rows: a concurrent checkout of the same cart waits here
    // and then finds the rows gone.
    let mut lines = tx.lock_cart(user_id).await?;
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart(user_id));
    }

    // Two carts sharing products must lock their rows in the same order.
    lines.sort_by_key(|line| line.product_id);
    for line in &lines {
        InventoryLedger::reserve(tx, line.product_id, line.quantity).await?;
    }

    // Priced from the snapshot read above, not from the product rows now.
    let order = OrderRecord {
        id: OrderId::new(),
        user_id,
        total_price: total_price(&lines)?,
        status: OrderStatus::Pending,
        created_at: Utc::now(),
    };
    tx.insert_order(&order).await?;

    let mut order_lines = Vec::with_capacity(lines.len());
    for line in &lines {
        let order_line = OrderLine {
            id: LineId::new(),
            order_id: order.id,
            product_id: line.product_id,
            unit_price: line.unit_price,
            quantity: line.quantity,
        };
        tx.insert_order_line(&order_line).await?;
        order_lines.push(order_line);
    }

    // Only the rows read above; anything added since stays in the cart.
    let item_ids: Vec<LineId> = lines.iter().map(|line| line.item_id).collect();
    tx.remove_cart_items(&item_ids).await?;

    Ok(PlacedOrder {
        order_id: order.id,
        user_id,
        status: order.status,
        total_price: order.total_price,
        lines: order_lines,
    })
}

fn failure_reason(err: &CheckoutError) -> &'static str {
    match err {
        CheckoutError::EmptyCart(_) => "empty_cart",
        CheckoutError::ProductNotFound(_) => "product_not_found",
        CheckoutError::OutOfStock { .. } => "out_of_stock",
        CheckoutError::Inventory(_) => "inventory",
        CheckoutError::Pricing(_) => "pricing",
        CheckoutError::Store(_) => "store",
    }
}
