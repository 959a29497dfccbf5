//! Long-running consumer loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::bus::{Message, MessageBus};

/// Default bounded wait of one poll cycle.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause after a failed read or a transient handler failure.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Default number of times a message is handled before a transient failure
/// is given up on.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Processes messages delivered by a [`Consumer`].
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Returns the handler name, used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Handles one message.
    async fn handle(&self, message: &Message) -> Result<()>;
}

/// Polls one (topic, consumer group) assignment and feeds a handler.
///
/// Messages are handled one at a time in offset order. A handler failure
/// that [`MessagingError::is_transient`] is retried after a back-off, up to
/// the attempt limit; any other failure is logged and the message committed,
/// so a message that can never be handled does not block the ones behind
/// it. Read errors are logged and retried after a back-off. The loop exits
/// when its [`CancellationToken`] is cancelled; a message whose retries are
/// interrupted stays uncommitted and is redelivered.
///
/// [`MessagingError::is_transient`]: crate::MessagingError::is_transient
pub struct Consumer {
    bus: Arc<dyn MessageBus>,
    topic: String,
    group: String,
    handler: Arc<dyn MessageHandler>,
    poll_timeout: Duration,
    retry_backoff: Duration,
    max_attempts: u32,
}

impl Consumer {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        topic: impl Into<String>,
        group: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            bus,
            topic: topic.into(),
            group: group.into(),
            handler,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Sets how many times a message is handled before a transient failure
    /// is given up on. At least one.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Runs the loop on its own task.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Runs the loop until `shutdown` is cancelled.
    #[tracing::instrument(
        skip_all,
        fields(topic = %self.topic, group = %self.group, handler = self.handler.name())
    )]
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!("consumer started");

        loop {
            let polled = tokio::select! {
                _ = shutdown.cancelled() => break,
                polled = self.bus.poll(&self.topic, &self.group, self.poll_timeout) => polled,
            };

            match polled {
                Ok(Some(message)) => {
                    if !self.process(&message, &shutdown).await {
                        break;
                    }
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "poll failed, backing off");
                    metrics::counter!("bus_read_errors_total", "topic" => self.topic.clone())
                        .increment(1);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.retry_backoff) => {}
                    }
                }
            }
        }

        tracing::info!("consumer stopped");
    }

    /// Handles and commits one message. Returns false if shutdown was
    /// requested before the message could be committed.
    async fn process(&self, message: &Message, shutdown: &CancellationToken) -> bool {
        let mut attempt = 1;
        loop {
            match self.handler.handle(message).await {
                Ok(()) => break,
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    tracing::warn!(
                        offset = message.offset,
                        attempt,
                        error = %e,
                        "handler failed, retrying"
                    );
                    metrics::counter!("bus_handler_retries_total", "handler" => self.handler.name())
                        .increment(1);
                    attempt += 1;
                    tokio::select! {
                        _ = shutdown.cancelled() => return false,
                        _ = tokio::time::sleep(self.retry_backoff) => {}
                    }
                }
                Err(e) => {
                    tracing::error!(
                        offset = message.offset,
                        key = %message.key,
                        attempts = attempt,
                        error = %e,
                        "handler failed, skipping message"
                    );
                    metrics::counter!("bus_handler_failures_total", "handler" => self.handler.name())
                        .increment(1);
                    break;
                }
            }
        }
        metrics::counter!("bus_messages_consumed_total", "topic" => self.topic.clone())
            .increment(1);

        // An uncommitted offset is redelivered on the next poll.
        if let Err(e) = self
            .bus
            .commit(&self.topic, &self.group, message.offset)
            .await
        {
            tracing::warn!(offset = message.offset, error = %e, "offset commit failed");
        }
        true
    }
}
