//! Message bus port.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BusError;

/// A record read from a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Topic the message was read from.
    pub topic: String,

    /// Partitioning key.
    pub key: String,

    /// Encoded payload.
    pub value: Vec<u8>,

    /// Position of the message in its topic, starting at 0.
    pub offset: u64,
}

impl Message {
    /// Returns the payload as UTF-8 text, if it is valid UTF-8.
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

/// Publish/consume port of the message bus.
///
/// Delivery is at-least-once: [`MessageBus::poll`] keeps returning the
/// message at a group's committed position until the group commits past it.
/// Each consumer group tracks its own position, so groups never steal
/// messages from one another.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Appends a message to a topic. Returns the offset it was stored at.
    async fn publish(&self, topic: &str, key: &str, value: Vec<u8>) -> Result<u64, BusError>;

    /// Waits up to `timeout` for the next uncommitted message of `group`.
    ///
    /// Returns `Ok(None)` when the wait elapses with nothing to read.
    async fn poll(
        &self,
        topic: &str,
        group: &str,
        timeout: Duration,
    ) -> Result<Option<Message>, BusError>;

    /// Marks every message up to and including `offset` as processed by
    /// `group`. Committing an offset behind the current position is a no-op.
    async fn commit(&self, topic: &str, group: &str, offset: u64) -> Result<(), BusError>;
}
