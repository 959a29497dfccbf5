//! In-memory message bus for tests and single-process runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::bus::{Message, MessageBus};
use crate::error::BusError;

#[derive(Debug, Default)]
struct BusState {
    /// Append-only log per topic; a message's offset is its index.
    topics: HashMap<String, Vec<Message>>,
    /// Next offset to deliver, per (topic, group).
    positions: HashMap<(String, String), u64>,
}

impl BusState {
    fn position(&self, topic: &str, group: &str) -> u64 {
        self.positions
            .get(&(topic.to_string(), group.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn next_for(&self, topic: &str, group: &str) -> Option<Message> {
        let position = usize::try_from(self.position(topic, group)).ok()?;
        self.topics.get(topic)?.get(position).cloned()
    }
}

/// In-memory [`MessageBus`].
///
/// Clones share the same log and group positions. Pollers park on a
/// [`Notify`] and are woken by every publish, so a poll returns as soon as a
/// message arrives rather than at the end of its timeout.
#[derive(Clone, Default)]
pub struct InMemoryBus {
    state: Arc<Mutex<BusState>>,
    notify: Arc<Notify>,
    fail_on_publish: Arc<AtomicBool>,
    fail_on_poll: Arc<AtomicBool>,
}

impl InMemoryBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent publish fail until reset.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent poll fail until reset.
    pub fn set_fail_on_poll(&self, fail: bool) {
        self.fail_on_poll.store(fail, Ordering::SeqCst);
    }

    /// Returns every message ever published to a topic.
    pub async fn messages(&self, topic: &str) -> Vec<Message> {
        self.state
            .lock()
            .await
            .topics
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the next offset `group` will be handed on `topic`.
    pub async fn committed_position(&self, topic: &str, group: &str) -> u64 {
        self.state.lock().await.position(topic, group)
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, topic: &str, key: &str, value: Vec<u8>) -> Result<u64, BusError> {
        if self.fail_on_publish.load(Ordering::SeqCst) {
            return Err(BusError::Publish {
                topic: topic.to_string(),
                reason: "broker unavailable".to_string(),
            });
        }

        let offset = {
            let mut state = self.state.lock().await;
            let log = state.topics.entry(topic.to_string()).or_default();
            let offset = log.len() as u64;
            log.push(Message {
                topic: topic.to_string(),
                key: key.to_string(),
                value,
                offset,
            });
            offset
        };

        self.notify.notify_waiters();
        tracing::trace!(topic, key, offset, "message published");
        Ok(offset)
    }

    async fn poll(
        &self,
        topic: &str,
        group: &str,
        timeout: Duration,
    ) -> Result<Option<Message>, BusError> {
        if self.fail_on_poll.load(Ordering::SeqCst) {
            return Err(BusError::Read {
                topic: topic.to_string(),
                reason: "broker unavailable".to_string(),
            });
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register for wake-ups before checking the log so a publish that
            // lands between the check and the wait is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.state.lock().await.next_for(topic, group) {
                return Ok(Some(message));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn commit(&self, topic: &str, group: &str, offset: u64) -> Result<(), BusError> {
        let mut state = self.state.lock().await;
        let len = state.topics.get(topic).map_or(0, |log| log.len() as u64);
        if offset >= len {
            return Err(BusError::Commit {
                topic: topic.to_string(),
                offset,
                reason: format!("topic has {len} messages"),
            });
        }

        let position = state
            .positions
            .entry((topic.to_string(), group.to_string()))
            .or_insert(0);
        *position = (*position).max(offset + 1);
        Ok(())
    }
}
