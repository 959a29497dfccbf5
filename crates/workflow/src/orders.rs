//! Order read side.

use common::{OrderId, UserId};
use serde::Serialize;
use store::{OrderLine, OrderRecord, Result, Store};

/// An order together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: OrderRecord,
    pub lines: Vec<OrderLine>,
}

/// Reads orders without taking locks.
pub struct OrderQueries<S: Store> {
    store: S,
}

impl<S: Store> OrderQueries<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderDetails>> {
        let Some(order) = self.store.get_order(order_id).await? else {
            return Ok(None);
        };
        let lines = self.store.order_lines(order_id).await?;
        Ok(Some(OrderDetails { order, lines }))
    }

    /// Returns a user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderRecord>> {
        self.store.orders_for_user(user_id).await
    }
}
