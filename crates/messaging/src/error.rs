//! Messaging error types.

use common::OrderId;
use store::StoreError;
use thiserror::Error;

/// Transport-level failures reported by a [`crate::MessageBus`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The message could not be appended to the topic.
    #[error("Publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    /// Reading from the topic failed.
    #[error("Read from {topic} failed: {reason}")]
    Read { topic: String, reason: String },

    /// The consumer group offset could not be advanced.
    #[error("Commit of offset {offset} on {topic} failed: {reason}")]
    Commit {
        topic: String,
        offset: u64,
        reason: String,
    },
}

/// Errors raised while publishing or handling messages.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// An error occurred in the bus transport.
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// Failed to encode or decode a message payload.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The event refers to an order the store does not know.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A notification sink refused delivery.
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl MessagingError {
    /// Returns true if handling the same message again may succeed.
    ///
    /// Malformed payloads and unknown orders never will; store, bus and
    /// delivery failures can clear up on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            MessagingError::Bus(_) | MessagingError::Store(_) | MessagingError::Delivery(_) => true,
            MessagingError::Serialization(_) | MessagingError::OrderNotFound(_) => false,
        }
    }
}

/// Result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;
