//! Order-status notifications.

use std::sync::Arc;

use async_trait::async_trait;
use common::{Money, OrderId, OrderStatus, UserId};
use store::Store;

use crate::bus::Message;
use crate::consumer::MessageHandler;
use crate::error::MessagingError;
use crate::events::OrderStatusEvent;
use crate::Result;

/// What a customer is told about their order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_price: Money,
}

impl Notification {
    /// Short human-readable headline for the status.
    pub fn headline(&self) -> &'static str {
        match self.status {
            OrderStatus::Pending => "order received",
            OrderStatus::Completed => "order placed",
            OrderStatus::Canceled => "order canceled",
        }
    }
}

/// Delivers notifications to customers.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Sink that writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            order_id = %notification.order_id,
            user_id = %notification.user_id,
            status = %notification.status,
            total_price = %notification.total_price,
            "{}",
            notification.headline()
        );
        Ok(())
    }
}

/// Handler that turns [`OrderStatusEvent`]s into [`Notification`]s.
///
/// The event only carries the order id and status; the recipient and the
/// amount are read from the store.
pub struct OrderStatusNotifier<S: Store> {
    store: S,
    sink: Arc<dyn NotificationSink>,
}

impl<S: Store> OrderStatusNotifier<S> {
    pub fn new(store: S, sink: Arc<dyn NotificationSink>) -> Self {
        Self { store, sink }
    }
}

#[async_trait]
impl<S: Store> MessageHandler for OrderStatusNotifier<S> {
    fn name(&self) -> &'static str {
        "order_status_notifier"
    }

    #[tracing::instrument(skip_all, fields(offset = message.offset))]
    async fn handle(&self, message: &Message) -> Result<()> {
        let event = OrderStatusEvent::from_bytes(&message.value)?;
        let order = self
            .store
            .get_order(event.order_id)
            .await?
            .ok_or(MessagingError::OrderNotFound(event.order_id))?;

        let notification = Notification {
            order_id: order.id,
            user_id: order.user_id,
            status: event.status,
            total_price: order.total_price,
        };
        self.sink.deliver(&notification).await?;
        metrics::counter!("notifications_sent_total", "status" => event.status.as_str())
            .increment(1);
        Ok(())
    }
}
