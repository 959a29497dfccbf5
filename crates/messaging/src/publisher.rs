//! Order-status publication.

use std::sync::Arc;

use crate::Result;
use crate::bus::MessageBus;
use crate::events::OrderStatusEvent;

/// Publishes [`OrderStatusEvent`]s to a fixed topic.
#[derive(Clone)]
pub struct OrderStatusPublisher {
    bus: Arc<dyn MessageBus>,
    topic: String,
}

impl OrderStatusPublisher {
    pub fn new(bus: Arc<dyn MessageBus>, topic: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Encodes and publishes an event. Returns the offset it was stored at.
    #[tracing::instrument(skip(self), fields(topic = %self.topic))]
    pub async fn publish(&self, event: &OrderStatusEvent) -> Result<u64> {
        let value = event.to_bytes()?;
        let offset = self.bus.publish(&self.topic, &event.key(), value).await?;
        metrics::counter!("order_status_events_published_total").increment(1);
        tracing::debug!(offset, "order status published");
        Ok(offset)
    }
}
