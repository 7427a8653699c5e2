//! Topic listener: a generic poll-dispatch adapter for one broker topic.
//!
//! [`TopicListener`] bridges a pull-based broker subscription to a
//! push-style per-record handler. It composes three externally supplied
//! capabilities (a [`BrokerConsumer`], a [`MessageHandler`], and an
//! [`EventLogger`]) and owns one background worker that runs the poll loop
//! from [`start`](TopicListener::start) until [`stop`](TopicListener::stop).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   poll(timeout)    ┌──────────────────┐
//! │    Broker    │◄───────────────────│  worker (1 task) │
//! │   Consumer   │───────────────────►│  poll → dispatch │
//! └──────────────┘    record batch    └────────┬─────────┘
//!                                              │ handle(value),
//!                                              │ in batch order
//!                                              ▼
//!                                     ┌──────────────────┐
//!                                     │  MessageHandler  │
//!                                     └──────────────────┘
//! ```
//!
//! # Failure Philosophy
//!
//! The loop is built to never terminate itself:
//!
//! - a failed poll is reported via [`EventLogger::poll_failed`] and retried
//!   by the next iteration, indefinitely;
//! - a failed record is logged, counted as lost, and dropped: the rest of
//!   the batch still runs. Committed offsets advance regardless of handler
//!   outcome, so this mirrors the broker's delivery semantics rather than
//!   fighting them.
//!
//! Nothing is surfaced synchronously to any caller; all failure information
//! is observability-only.
//!
//! # Shutdown
//!
//! Cancellation is cooperative: the worker checks the stop signal at the top
//! of each iteration, never mid-poll and never mid-handler. The poll call's
//! own timeout bounds the check cadence. [`stop`](TopicListener::stop) waits
//! up to [`ListenerConfig::shutdown_wait`] for a clean exit, then aborts the
//! worker; in that degraded case the consumer may remain unclosed.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use topic_listener::{ListenerConfig, TopicListener, TracingEventLogger};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let consumer = build_consumer()?; // any BrokerConsumer
//! let mut listener = TopicListener::new(
//!     "order-events",
//!     consumer,
//!     Arc::new(OrderHandler),
//!     Arc::new(TracingEventLogger::new()),
//! )?;
//!
//! listener.start()?;
//! // ... run until deactivation ...
//! listener.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;

use topic_listener_core::{
    BrokerConsumer, ConsumerError, EventLogger, MessageHandler, RecordBatch,
};

/// Default bound on how long one poll call may wait for records.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on how long [`TopicListener::stop`] waits for a clean exit.
pub const DEFAULT_SHUTDOWN_WAIT: Duration = Duration::from_secs(10);

/// Timing configuration for a [`TopicListener`].
///
/// # Default Values
///
/// - `poll_timeout`: 5 seconds
/// - `shutdown_wait`: 10 seconds
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use topic_listener::ListenerConfig;
///
/// let config = ListenerConfig::new()
///     .with_poll_timeout(Duration::from_secs(1))
///     .with_shutdown_wait(Duration::from_secs(30));
/// assert_eq!(config.poll_timeout, Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerConfig {
    /// How long one poll call may suspend waiting for records.
    ///
    /// Also the cancellation-check cadence: the worker observes a stop
    /// signal no later than one poll window after it is raised.
    pub poll_timeout: Duration,
    /// How long [`TopicListener::stop`] waits for the worker to exit before
    /// forcing termination.
    pub shutdown_wait: Duration,
}

impl ListenerConfig {
    /// Create a configuration with the default timeouts.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            shutdown_wait: DEFAULT_SHUTDOWN_WAIT,
        }
    }

    /// Set the poll timeout.
    #[must_use]
    pub const fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set the shutdown wait bound.
    #[must_use]
    pub const fn with_shutdown_wait(mut self, wait: Duration) -> Self {
        self.shutdown_wait = wait;
        self
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors from listener lifecycle operations.
///
/// The poll loop itself never returns an error; these cover construction and
/// the explicit state machine around `start`/`stop`.
#[derive(Error, Debug)]
pub enum ListenerError {
    /// The topic name was empty at construction
    #[error("Topic name must not be empty")]
    EmptyTopic,

    /// `start()` was called on a listener that is not freshly constructed
    #[error("Listener for topic '{0}' has already been started")]
    AlreadyStarted(String),

    /// `stop()` was called on a listener that is not running
    #[error("Listener for topic '{0}' is not running")]
    NotRunning(String),

    /// Subscribing the consumer to the topic failed during `start()`
    #[error("Subscription failed for topic '{topic}'")]
    SubscriptionFailed {
        /// The topic that could not be subscribed
        topic: String,
        /// The consumer's subscription error
        #[source]
        source: ConsumerError,
    },
}

/// [`EventLogger`] implementation backed by `tracing`.
///
/// Emits the distinguished events at the severities the operations team
/// expects: poll failures at error, interruption and shutdown at warn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventLogger;

impl TracingEventLogger {
    /// Create a new tracing-backed event logger.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventLogger for TracingEventLogger {
    fn poll_failed(&self, topic: &str, cause: &ConsumerError) {
        tracing::error!(topic, error = %cause, "Consumer poll failed");
    }

    fn listener_interrupted(&self, topic: &str) {
        tracing::warn!(topic, "Listener interrupted");
    }

    fn worker_shutdown(&self, worker_name: &str) {
        tracing::warn!(worker = worker_name, "Listener worker shut down");
    }
}

/// Lifecycle state. `Stopping` from the design state machine exists only
/// transiently inside `stop()` and needs no variant of its own.
enum State<C, H> {
    Constructed { consumer: C, handler: Arc<H> },
    Running {
        cancel: CancellationToken,
        worker: JoinHandle<()>,
    },
    Closed,
}

/// A listener bound to one broker topic.
///
/// Owns a [`BrokerConsumer`] and one background worker; shares a
/// [`MessageHandler`] and an [`EventLogger`] with its host. Constructed
/// without I/O; [`start`](Self::start) subscribes and launches the worker,
/// [`stop`](Self::stop) shuts it down with a bounded wait.
///
/// One listener per topic: consumer instances must never be shared across
/// listeners. Multiple listeners run independently of each other.
pub struct TopicListener<C, H>
where
    C: BrokerConsumer,
    H: MessageHandler<Message = C::Message>,
{
    topic: String,
    worker_name: String,
    config: ListenerConfig,
    logger: Arc<dyn EventLogger>,
    records_lost: Arc<AtomicU64>,
    state: State<C, H>,
}

impl<C, H> TopicListener<C, H>
where
    C: BrokerConsumer,
    H: MessageHandler<Message = C::Message>,
{
    /// Create a listener with the default [`ListenerConfig`].
    ///
    /// Performs no I/O: the consumer is not subscribed and no worker exists
    /// until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::EmptyTopic`] if `topic` is empty.
    pub fn new(
        topic: impl Into<String>,
        consumer: C,
        handler: Arc<H>,
        logger: Arc<dyn EventLogger>,
    ) -> Result<Self, ListenerError> {
        Self::with_config(topic, consumer, handler, logger, ListenerConfig::default())
    }

    /// Create a listener with an explicit [`ListenerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::EmptyTopic`] if `topic` is empty.
    pub fn with_config(
        topic: impl Into<String>,
        consumer: C,
        handler: Arc<H>,
        logger: Arc<dyn EventLogger>,
        config: ListenerConfig,
    ) -> Result<Self, ListenerError> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(ListenerError::EmptyTopic);
        }
        let worker_name = format!("listener-{topic}");
        Ok(Self {
            topic,
            worker_name,
            config,
            logger,
            records_lost: Arc::new(AtomicU64::new(0)),
            state: State::Constructed { consumer, handler },
        })
    }

    /// Subscribe to the topic and launch the poll-loop worker.
    ///
    /// Returns immediately; it does not wait for the worker to poll.
    ///
    /// # Errors
    ///
    /// - [`ListenerError::AlreadyStarted`] if the listener is not freshly
    ///   constructed. Starting twice is an explicit error, not undefined
    ///   behavior.
    /// - [`ListenerError::SubscriptionFailed`] if the consumer rejects the
    ///   subscription; the listener is then closed and cannot be reused.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime (the worker is a spawned
    /// task).
    pub fn start(&mut self) -> Result<(), ListenerError> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Constructed {
                mut consumer,
                handler,
            } => {
                consumer
                    .subscribe(&[self.topic.as_str()])
                    .map_err(|source| ListenerError::SubscriptionFailed {
                        topic: self.topic.clone(),
                        source,
                    })?;

                let cancel = CancellationToken::new();
                let span = tracing::info_span!("poll_loop", worker = %self.worker_name);
                let worker = tokio::spawn(
                    poll_loop(
                        consumer,
                        handler,
                        Arc::clone(&self.logger),
                        self.topic.clone(),
                        self.config.poll_timeout,
                        cancel.clone(),
                        Arc::clone(&self.records_lost),
                    )
                    .instrument(span),
                );

                tracing::info!(
                    topic = %self.topic,
                    worker = %self.worker_name,
                    "Listener started"
                );
                self.state = State::Running { cancel, worker };
                Ok(())
            },
            other => {
                self.state = other;
                Err(ListenerError::AlreadyStarted(self.topic.clone()))
            },
        }
    }

    /// Signal the worker to stop and wait, bounded, for it to exit.
    ///
    /// The signal is cooperative: an in-flight poll or handler call is never
    /// interrupted. If the worker does not exit within
    /// [`ListenerConfig::shutdown_wait`] it is aborted: best-effort, since a
    /// worker stuck in synchronous handler code only terminates at its next
    /// await point, and the consumer close step may then be skipped.
    ///
    /// An expired wait is not an error; `stop` swallows it and proceeds to
    /// forced termination.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::NotRunning`] if the listener was never
    /// started or is already stopped.
    pub async fn stop(&mut self) -> Result<(), ListenerError> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Running { cancel, mut worker } => {
                cancel.cancel();
                match tokio::time::timeout(self.config.shutdown_wait, &mut worker).await {
                    Ok(Ok(())) => {
                        tracing::debug!(topic = %self.topic, "Listener worker exited cleanly");
                    },
                    Ok(Err(join_error)) => {
                        tracing::warn!(
                            topic = %self.topic,
                            error = %join_error,
                            "Listener worker terminated abnormally"
                        );
                    },
                    Err(_elapsed) => {
                        tracing::warn!(
                            topic = %self.topic,
                            wait = ?self.config.shutdown_wait,
                            "Worker did not exit within the shutdown wait; aborting \
                             (consumer may remain unclosed)"
                        );
                        worker.abort();
                    },
                }
                self.logger.worker_shutdown(&self.worker_name);
                Ok(())
            },
            other => {
                self.state = other;
                Err(ListenerError::NotRunning(self.topic.clone()))
            },
        }
    }

    /// The topic this listener is bound to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The generated worker name (`"listener-" + topic`), used in
    /// diagnostics.
    #[must_use]
    pub fn worker_name(&self) -> &str {
        &self.worker_name
    }

    /// Whether the worker is currently running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    /// Number of records dropped after handler failures, over this
    /// listener's lifetime.
    #[must_use]
    pub fn records_lost(&self) -> u64 {
        self.records_lost.load(Ordering::Relaxed)
    }
}

/// The worker: sequential poll-then-dispatch cycles until the stop signal.
///
/// The cancellation check happens only here at loop-top, so a poll or a
/// handler call is never cut short. On observing the signal the loop logs
/// the interruption and closes the consumer exactly once.
async fn poll_loop<C, H>(
    mut consumer: C,
    handler: Arc<H>,
    logger: Arc<dyn EventLogger>,
    topic: String,
    poll_timeout: Duration,
    cancel: CancellationToken,
    records_lost: Arc<AtomicU64>,
) where
    C: BrokerConsumer,
    H: MessageHandler<Message = C::Message>,
{
    while !cancel.is_cancelled() {
        match consumer.poll(poll_timeout).await {
            Ok(batch) => dispatch_batch(handler.as_ref(), &topic, batch, &records_lost),
            Err(error) => logger.poll_failed(&topic, &error),
        }
    }
    logger.listener_interrupted(&topic);
    consumer.close();
}

/// Dispatch one batch to the handler, strictly in delivery order.
///
/// A failed record is counted and dropped; the records after it still run.
fn dispatch_batch<H>(
    handler: &H,
    topic: &str,
    batch: RecordBatch<H::Message>,
    records_lost: &AtomicU64,
) where
    H: MessageHandler,
{
    for record in batch {
        tracing::debug!(topic, key = ?record.key, "Received record");
        if let Err(error) = handler.handle(record.value) {
            records_lost.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("listener.records.lost", "topic" => topic.to_string()).increment(1);
            tracing::warn!(
                handler = handler.name(),
                topic,
                error = %error,
                "Handler failed, record lost"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn config_defaults_match_documented_values() {
        let config = ListenerConfig::default();
        assert_eq!(config.poll_timeout, Duration::from_secs(5));
        assert_eq!(config.shutdown_wait, Duration::from_secs(10));
    }

    #[test]
    fn config_setters_override_defaults() {
        let config = ListenerConfig::new()
            .with_poll_timeout(Duration::from_millis(50))
            .with_shutdown_wait(Duration::from_millis(200));
        assert_eq!(config.poll_timeout, Duration::from_millis(50));
        assert_eq!(config.shutdown_wait, Duration::from_millis(200));
    }

    #[test]
    fn listener_error_messages_name_the_topic() {
        let error = ListenerError::AlreadyStarted("order-events".to_string());
        assert!(error.to_string().contains("order-events"));
    }
}
