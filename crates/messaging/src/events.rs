//! Events carried on the bus.

use common::{OrderId, OrderStatus};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Announces that an order reached a new status.
///
/// Encoded as JSON `{"order_id": "<uuid>", "status": "<status>"}` and keyed
/// by order id, so every event of one order lands on the same partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusEvent {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

impl OrderStatusEvent {
    pub fn new(order_id: OrderId, status: OrderStatus) -> Self {
        Self { order_id, status }
    }

    /// Partitioning key.
    pub fn key(&self) -> String {
        self.order_id.to_string()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
