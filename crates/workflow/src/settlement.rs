//! Payment settlement: pending order to completed or canceled.

use common::{OrderId, OrderStatus};
use domain::{InventoryLedger, PaymentOutcome, Transition, transition};
use messaging::{OrderStatusEvent, OrderStatusPublisher};
use serde::Serialize;
use store::{Store, Transaction};

use crate::error::SettlementError;

/// What settling did to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "status", rename_all = "snake_case")]
pub enum Settlement {
    /// The order left `pending` for this status.
    Applied(OrderStatus),

    /// The order was already terminal; nothing changed.
    AlreadySettled(OrderStatus),
}

impl Settlement {
    /// The order's status after settlement.
    pub fn status(&self) -> OrderStatus {
        match self {
            Settlement::Applied(status) | Settlement::AlreadySettled(status) => *status,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Settlement::Applied(_))
    }
}

/// Applies payment outcomes to pending orders.
///
/// The status change and the matching ledger operation commit together.
/// Only after the commit is an [`OrderStatusEvent`] published; a failed
/// publish is logged and never undoes the committed settlement. Settling an
/// order that is already terminal is a no-op, so redelivered payment signals
/// are harmless.
pub struct SettlementProcessor<S: Store> {
    store: S,
    publisher: OrderStatusPublisher,
}

impl<S: Store> SettlementProcessor<S> {
    pub fn new(store: S, publisher: OrderStatusPublisher) -> Self {
        Self { store, publisher }
    }

    /// Settles an order with a payment outcome.
    #[tracing::instrument(skip(self))]
    pub async fn settle(
        &self,
        order_id: OrderId,
        outcome: PaymentOutcome,
    ) -> Result<Settlement, SettlementError> {
        let settlement = match self.run(order_id, outcome).await {
            Ok(settlement) => settlement,
            Err(e) => {
                metrics::counter!("settlement_failures_total", "outcome" => outcome.as_str())
                    .increment(1);
                tracing::warn!(error = %e, "settlement failed");
                return Err(e);
            }
        };

        match settlement {
            Settlement::Applied(status) => {
                metrics::counter!("settlements_total", "outcome" => outcome.as_str())
                    .increment(1);
                tracing::info!(%status, "order settled");
                self.announce(order_id, status).await;
            }
            Settlement::AlreadySettled(status) => {
                metrics::counter!("settlement_duplicates_total").increment(1);
                tracing::warn!(%status, "order already settled, ignoring payment signal");
            }
        }

        Ok(settlement)
    }

    async fn run(
        &self,
        order_id: OrderId,
        outcome: PaymentOutcome,
    ) -> Result<Settlement, SettlementError> {
        let mut tx = self.store.begin().await?;
        match apply(tx.as_mut(), order_id, outcome).await {
            Ok(settlement) => {
                tx.commit().await?;
                Ok(settlement)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn announce(&self, order_id: OrderId, status: OrderStatus) {
        let event = OrderStatusEvent::new(order_id, status);
        if let Err(e) = self.publisher.publish(&event).await {
            metrics::counter!("order_status_publish_failures_total").increment(1);
            tracing::error!(error = %e, "order status publish failed");
        }
    }
}

async fn apply(
    tx: &mut dyn Transaction,
    order_id: OrderId,
    outcome: PaymentOutcome,
) -> Result<Settlement, SettlementError> {
    // The row lock makes a concurrent duplicate wait here and then see the
    // terminal status.
    let order = tx
        .lock_order(order_id)
        .await?
        .ok_or(SettlementError::OrderNotFound(order_id))?;

    let to = match transition(order.status, outcome) {
        Transition::AlreadySettled(status) => return Ok(Settlement::AlreadySettled(status)),
        Transition::Apply { to, .. } => to,
    };

    tx.update_order_status(order_id, to).await?;
    match outcome {
        PaymentOutcome::Success => InventoryLedger::deduct(tx, order_id).await?,
        PaymentOutcome::Failure => InventoryLedger::restore(tx, order_id).await?,
    }

    Ok(Settlement::Applied(to))
}
