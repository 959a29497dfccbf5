//! Message bus plumbing for the order-processing backend.
//!
//! This crate provides:
//! - [`MessageBus`], the publish/poll/commit port with consumer-group offsets
//! - [`InMemoryBus`], a single-process implementation of that port
//! - [`OrderStatusEvent`] and the [`OrderStatusPublisher`] that emits it
//! - [`Consumer`], the long-running poll loop that feeds a [`MessageHandler`]
//! - [`OrderStatusNotifier`], the handler that turns order-status events
//!   into notifications

pub mod bus;
pub mod consumer;
pub mod error;
pub mod events;
pub mod memory;
pub mod notifier;
pub mod publisher;

pub use bus::{Message, MessageBus};
pub use consumer::{Consumer, MessageHandler};
pub use error::{BusError, MessagingError, Result};
pub use events::OrderStatusEvent;
pub use memory::InMemoryBus;
pub use notifier::{LogSink, Notification, NotificationSink, OrderStatusNotifier};
pub use publisher::OrderStatusPublisher;
