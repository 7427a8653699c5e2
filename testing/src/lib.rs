//! # Topic Listener Testing
//!
//! Test doubles for the topic listener capabilities.
//!
//! This crate provides:
//! - [`ScriptedConsumer`]: a fake broker consumer driven by a script of
//!   poll outcomes
//! - [`RecordingHandler`]: a handler that records every payload and can be
//!   told to fail
//! - [`BlockingHandler`]: a handler that stalls the worker, for shutdown
//!   tests
//! - [`RecordingLogger`]: an event logger that captures emitted events
//!
//! All doubles expose shared probes so a test keeps visibility after the
//! double itself moves into the listener.
//!
//! ## Example
//!
//! ```ignore
//! use topic_listener_testing::{PollOutcome, RecordingHandler, ScriptedConsumer};
//!
//! let consumer = ScriptedConsumer::new(vec![PollOutcome::Batch(batch)]);
//! let probe = consumer.probe();
//! let handler = RecordingHandler::succeeding();
//!
//! // ... drive a TopicListener, then:
//! assert_eq!(probe.close_count(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use topic_listener_core::{
    BrokerConsumer, ConsumerError, EventLogger, HandlerError, MessageHandler, PollFuture,
    RecordBatch,
};

/// Lock a probe mutex, recovering from poisoning. A probe holds plain data,
/// so a panicking test thread leaves nothing inconsistent behind.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock implementations of the listener capabilities.
pub mod mocks {
    use super::{
        Arc, AtomicUsize, BrokerConsumer, ConsumerError, Duration, EventLogger, HandlerError,
        MessageHandler, Mutex, Ordering, PollFuture, RecordBatch, VecDeque, lock,
    };

    /// One scripted outcome for a [`ScriptedConsumer`] poll call.
    #[derive(Debug, Clone)]
    pub enum PollOutcome<M> {
        /// The poll returns this batch immediately.
        Batch(RecordBatch<M>),
        /// The poll fails with this error immediately.
        Error(ConsumerError),
        /// The poll sleeps for its full timeout, then returns an empty
        /// batch: an idle broker that honors the poll contract.
        Hang,
        /// The poll never completes: a consumer violating its timeout
        /// contract, for forced-termination tests.
        Never,
    }

    /// Shared observation point for a [`ScriptedConsumer`].
    ///
    /// Obtained via [`ScriptedConsumer::probe`] before the consumer moves
    /// into a listener.
    #[derive(Debug, Default)]
    pub struct ConsumerProbe {
        subscribed: Mutex<Vec<String>>,
        poll_count: AtomicUsize,
        close_count: AtomicUsize,
    }

    impl ConsumerProbe {
        /// Topics passed to `subscribe`, in call order.
        #[must_use]
        pub fn subscribed_topics(&self) -> Vec<String> {
            lock(&self.subscribed).clone()
        }

        /// Number of poll calls issued so far.
        #[must_use]
        pub fn poll_count(&self) -> usize {
            self.poll_count.load(Ordering::SeqCst)
        }

        /// Number of times the consumer was closed. At most 1 by
        /// construction; a test asserting this guards the close-once
        /// contract.
        #[must_use]
        pub fn close_count(&self) -> usize {
            self.close_count.load(Ordering::SeqCst)
        }
    }

    /// Fake [`BrokerConsumer`] that replays a script of poll outcomes.
    ///
    /// Once the script is exhausted, every further poll behaves like
    /// [`PollOutcome::Hang`]: an idle broker returning empty batches after
    /// the full timeout.
    #[derive(Debug)]
    pub struct ScriptedConsumer<M> {
        script: VecDeque<PollOutcome<M>>,
        probe: Arc<ConsumerProbe>,
    }

    impl<M> ScriptedConsumer<M> {
        /// Create a consumer that replays `script` in order.
        #[must_use]
        pub fn new(script: Vec<PollOutcome<M>>) -> Self {
            Self {
                script: script.into(),
                probe: Arc::new(ConsumerProbe::default()),
            }
        }

        /// Shared probe for asserting on this consumer after it has moved
        /// into a listener.
        #[must_use]
        pub fn probe(&self) -> Arc<ConsumerProbe> {
            Arc::clone(&self.probe)
        }
    }

    impl<M> BrokerConsumer for ScriptedConsumer<M>
    where
        M: Send + 'static,
    {
        type Message = M;

        fn subscribe(&mut self, topics: &[&str]) -> Result<(), ConsumerError> {
            lock(&self.probe.subscribed).extend(topics.iter().map(ToString::to_string));
            Ok(())
        }

        fn poll(&mut self, timeout: Duration) -> PollFuture<'_, M> {
            self.probe.poll_count.fetch_add(1, Ordering::SeqCst);
            let outcome = self.script.pop_front();
            Box::pin(async move {
                match outcome {
                    Some(PollOutcome::Batch(batch)) => Ok(batch),
                    Some(PollOutcome::Error(error)) => Err(error),
                    Some(PollOutcome::Never) => std::future::pending().await,
                    Some(PollOutcome::Hang) | None => {
                        tokio::time::sleep(timeout).await;
                        Ok(Vec::new())
                    },
                }
            })
        }

        fn close(self) {
            self.probe.close_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Shared observation point for a [`RecordingHandler`].
    #[derive(Debug, Default)]
    pub struct HandlerProbe<M> {
        seen: Mutex<Vec<M>>,
    }

    impl<M: Clone> HandlerProbe<M> {
        /// Every payload the handler has been invoked with, in order,
        /// whether handling succeeded or failed.
        #[must_use]
        pub fn seen(&self) -> Vec<M> {
            lock(&self.seen).clone()
        }
    }

    enum HandlerMode<M> {
        Succeed,
        FailAll,
        FailOn(Vec<M>),
    }

    /// Fake [`MessageHandler`] that records every payload it receives.
    pub struct RecordingHandler<M> {
        probe: Arc<HandlerProbe<M>>,
        mode: HandlerMode<M>,
    }

    impl<M> RecordingHandler<M> {
        /// A handler that accepts every record.
        #[must_use]
        pub fn succeeding() -> Self {
            Self {
                probe: Arc::new(HandlerProbe {
                    seen: Mutex::new(Vec::new()),
                }),
                mode: HandlerMode::Succeed,
            }
        }

        /// A handler that rejects every record.
        #[must_use]
        pub fn failing() -> Self {
            Self {
                mode: HandlerMode::FailAll,
                ..Self::succeeding()
            }
        }

        /// A handler that rejects exactly the given payloads.
        #[must_use]
        pub fn failing_on(payloads: Vec<M>) -> Self {
            Self {
                mode: HandlerMode::FailOn(payloads),
                ..Self::succeeding()
            }
        }

        /// Shared probe for asserting on received payloads.
        #[must_use]
        pub fn probe(&self) -> Arc<HandlerProbe<M>> {
            Arc::clone(&self.probe)
        }
    }

    impl<M> MessageHandler for RecordingHandler<M>
    where
        M: Clone + PartialEq + Send + Sync + 'static,
    {
        type Message = M;

        fn handle(&self, message: M) -> Result<(), HandlerError> {
            lock(&self.probe.seen).push(message.clone());
            match &self.mode {
                HandlerMode::Succeed => Ok(()),
                HandlerMode::FailAll => Err(HandlerError::new("rejected by test handler")),
                HandlerMode::FailOn(payloads) if payloads.contains(&message) => {
                    Err(HandlerError::new("rejected by test handler"))
                },
                HandlerMode::FailOn(_) => Ok(()),
            }
        }

        fn name(&self) -> &'static str {
            "RecordingHandler"
        }
    }

    /// Fake [`MessageHandler`] that blocks the worker thread for a fixed
    /// interval on every record, simulating a handler that outlives the
    /// shutdown wait.
    pub struct BlockingHandler<M> {
        stall: Duration,
        calls: AtomicUsize,
        _marker: std::marker::PhantomData<fn(M)>,
    }

    impl<M> BlockingHandler<M> {
        /// A handler whose every call blocks for `stall`.
        #[must_use]
        pub const fn new(stall: Duration) -> Self {
            Self {
                stall,
                calls: AtomicUsize::new(0),
                _marker: std::marker::PhantomData,
            }
        }

        /// Number of records this handler has stalled on.
        #[must_use]
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl<M> MessageHandler for BlockingHandler<M>
    where
        M: Send + 'static,
    {
        type Message = M;

        fn handle(&self, _message: M) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.stall);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "BlockingHandler"
        }
    }

    /// One event captured by a [`RecordingLogger`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum LoggedEvent {
        /// A poll failure, with the rendered cause.
        PollFailed {
            /// Topic the poll ran against.
            topic: String,
            /// Rendered consumer error.
            cause: String,
        },
        /// The worker observed the stop signal.
        ListenerInterrupted {
            /// Topic the listener was bound to.
            topic: String,
        },
        /// The worker was shut down.
        WorkerShutdown {
            /// The listener's worker name.
            worker_name: String,
        },
    }

    /// Fake [`EventLogger`] that captures every distinguished event.
    #[derive(Debug, Default)]
    pub struct RecordingLogger {
        events: Mutex<Vec<LoggedEvent>>,
    }

    impl RecordingLogger {
        /// Create an empty recording logger.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Snapshot of the captured events, in emission order.
        #[must_use]
        pub fn events(&self) -> Vec<LoggedEvent> {
            lock(&self.events).clone()
        }

        /// Number of captured events matching `predicate`.
        pub fn count_matching(&self, predicate: impl Fn(&LoggedEvent) -> bool) -> usize {
            lock(&self.events).iter().filter(|e| predicate(e)).count()
        }
    }

    impl EventLogger for RecordingLogger {
        fn poll_failed(&self, topic: &str, cause: &ConsumerError) {
            lock(&self.events).push(LoggedEvent::PollFailed {
                topic: topic.to_string(),
                cause: cause.to_string(),
            });
        }

        fn listener_interrupted(&self, topic: &str) {
            lock(&self.events).push(LoggedEvent::ListenerInterrupted {
                topic: topic.to_string(),
            });
        }

        fn worker_shutdown(&self, worker_name: &str) {
            lock(&self.events).push(LoggedEvent::WorkerShutdown {
                worker_name: worker_name.to_string(),
            });
        }
    }
}

// Re-export commonly used items
pub use mocks::{
    BlockingHandler, ConsumerProbe, HandlerProbe, LoggedEvent, PollOutcome, RecordingHandler,
    RecordingLogger, ScriptedConsumer,
};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use topic_listener_core::ConsumerRecord;

    #[tokio::test]
    async fn scripted_consumer_replays_in_order() {
        let mut consumer = ScriptedConsumer::new(vec![
            PollOutcome::Batch(vec![ConsumerRecord::keyless("a".to_string())]),
            PollOutcome::Error(ConsumerError::TransportError("down".to_string())),
        ]);
        let probe = consumer.probe();

        let first = consumer.poll(Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.len(), 1);

        let second = consumer.poll(Duration::from_millis(10)).await;
        assert!(second.is_err());

        // Script exhausted: idle empty batch after the timeout.
        let third = consumer.poll(Duration::from_millis(10)).await.unwrap();
        assert!(third.is_empty());

        assert_eq!(probe.poll_count(), 3);
        consumer.close();
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn recording_handler_fails_selectively() {
        let handler = RecordingHandler::failing_on(vec!["bad".to_string()]);
        let probe = handler.probe();

        assert!(handler.handle("good".to_string()).is_ok());
        assert!(handler.handle("bad".to_string()).is_err());
        assert_eq!(probe.seen(), vec!["good".to_string(), "bad".to_string()]);
    }

    #[test]
    fn recording_logger_captures_events() {
        let logger = RecordingLogger::new();
        logger.listener_interrupted("orders");
        assert_eq!(
            logger.events(),
            vec![LoggedEvent::ListenerInterrupted {
                topic: "orders".to_string(),
            }]
        );
    }
}
