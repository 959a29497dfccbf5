use common::{OrderId, ProductId};
use store::{OrderLine, StockLevel, Transaction};

use crate::error::InventoryError;

#[derive(Debug, Clone, Copy)]
enum Settle {
    Deduct,
    Release,
}

impl Settle {
    fn as_str(self) -> &'static str {
        match self {
            Settle::Deduct => "deduct",
            Settle::Release => "release",
        }
    }
}

/// Owns every mutation of `stock` and `reserved_stock`.
///
/// The ledger holds no state of its own: each operation runs inside the
/// caller's transaction, so its effects commit or roll back together with
/// the rest of the caller's work.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryLedger;

impl InventoryLedger {
    /// Reserves `quantity` units of a product.
    ///
    /// The stock row is read under an exclusive row lock, which serializes
    /// concurrent reservations of the same product until the caller's
    /// transaction ends. Returns the stock level after the reservation.
    #[tracing::instrument(skip(tx))]
    pub async fn reserve(
        tx: &mut dyn Transaction,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<StockLevel, InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity { quantity });
        }

        let level = tx
            .lock_stock(product_id)
            .await?
            .ok_or(InventoryError::ProductNotFound(product_id))?;

        let available = level.available();
        if available < quantity {
            tracing::debug!(available, "reservation rejected");
            metrics::counter!("inventory_reservations_rejected_total").increment(1);
            return Err(InventoryError::OutOfStock {
                product_id,
                requested: quantity,
                available,
            });
        }

        tx.add_reserved_stock(product_id, quantity).await?;
        metrics::counter!("inventory_units_reserved_total").increment(u64::from(quantity));

        Ok(StockLevel {
            reserved_stock: level.reserved_stock + quantity,
            ..level
        })
    }

    /// Removes the reserved units of every line of an order from stock.
    ///
    /// Both `stock` and `reserved_stock` drop by the line quantity. Fails with
    /// [`InventoryError::InsufficientReservation`] when a line's guarded update
    /// matches no row; the caller must then abort its transaction.
    #[tracing::instrument(skip(tx))]
    pub async fn deduct(tx: &mut dyn Transaction, order_id: OrderId) -> Result<(), InventoryError> {
        Self::settle_lines(tx, order_id, Settle::Deduct).await
    }

    /// Returns the reserved units of every line of an order to the available
    /// pool without touching `stock`.
    ///
    /// Same zero-rows-means-failure convention as [`InventoryLedger::deduct`].
    #[tracing::instrument(skip(tx))]
    pub async fn restore(
        tx: &mut dyn Transaction,
        order_id: OrderId,
    ) -> Result<(), InventoryError> {
        Self::settle_lines(tx, order_id, Settle::Release).await
    }

    async fn settle_lines(
        tx: &mut dyn Transaction,
        order_id: OrderId,
        action: Settle,
    ) -> Result<(), InventoryError> {
        // Lines come back ordered by product id, keeping lock order stable.
        let lines: Vec<OrderLine> = tx.order_lines(order_id).await?;
        if lines.is_empty() {
            return Err(InventoryError::OrderHasNoLines(order_id));
        }

        for line in &lines {
            let updated = match action {
                Settle::Deduct => tx.deduct_stock(line.product_id, line.quantity).await?,
                Settle::Release => {
                    tx.release_reserved_stock(line.product_id, line.quantity)
                        .await?
                }
            };

            if updated == 0 {
                tracing::warn!(
                    product_id = %line.product_id,
                    quantity = line.quantity,
                    action = action.as_str(),
                    "guarded stock update matched no row"
                );
                return Err(InventoryError::InsufficientReservation {
                    order_id,
                    product_id: line.product_id,
                });
            }
        }

        Ok(())
    }
}
