//! Broker consumer abstraction.
//!
//! This module provides the [`BrokerConsumer`] trait: the pull side of a
//! message broker, reduced to the three operations the listener needs:
//! subscribe, poll, close. Connection management, offset commits, group
//! rebalancing, and payload deserialization all live behind this seam.
//!
//! # Delivery Semantics
//!
//! Implementations are assumed to provide **at-least-once** delivery:
//! duplicates are possible and the listener performs no deduplication.
//! Committed offsets advance regardless of what the handler does with a
//! record, so a failed record is a logged loss, not a redelivery.
//!
//! # Thread Safety
//!
//! A consumer instance is exclusively owned by a single listener worker.
//! Broker client objects are typically not safe for concurrent use, and the
//! trait is designed so they never need to be: `poll` takes `&mut self` and
//! at most one poll call is ever in flight.

use crate::record::RecordBatch;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during broker consumer operations.
#[derive(Error, Debug, Clone)]
pub enum ConsumerError {
    /// Failed to create or connect the underlying client
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// Failed to deserialize a record payload
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Network or transport error while polling
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Generic error for other failures
    #[error("Consumer error: {0}")]
    Other(String),
}

/// Future returned by [`BrokerConsumer::poll`].
pub type PollFuture<'a, M> =
    Pin<Box<dyn Future<Output = Result<RecordBatch<M>, ConsumerError>> + Send + 'a>>;

/// Trait for broker consumer implementations.
///
/// The listener drives a consumer through a fixed lifecycle: one
/// [`subscribe`](Self::subscribe) call, then repeated
/// [`poll`](Self::poll) calls from a single worker, then exactly one
/// [`close`](Self::close) when the worker exits.
///
/// # Poll Contract
///
/// `poll` may suspend for up to `timeout` waiting for records and must then
/// return: an empty batch for an idle window, an error for a broker,
/// transport, or deserialization failure. The listener relies on this bound
/// for a predictable cancellation-check cadence; a poll that overstays its
/// timeout delays shutdown.
///
/// # Close
///
/// `close` consumes the receiver, so the type system guarantees it runs at
/// most once. Because of the consuming receiver this trait is not
/// dyn-compatible; the listener is generic over its consumer instead.
///
/// `poll` returns an explicit `Pin<Box<dyn Future>>` so the returned future
/// is nameable and `Send` without return-type bounds on every caller.
pub trait BrokerConsumer: Send + 'static {
    /// The message payload type this consumer produces.
    type Message: Send + 'static;

    /// Subscribe to the given topics.
    ///
    /// Called once, before the first poll. The listener always passes a
    /// single topic.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::SubscriptionFailed`] if the subscription
    /// cannot be established.
    fn subscribe(&mut self, topics: &[&str]) -> Result<(), ConsumerError>;

    /// Poll for the next batch of records, waiting up to `timeout`.
    ///
    /// # Errors
    ///
    /// The returned future resolves to a [`ConsumerError`] on broker,
    /// transport, or deserialization failure. Poll errors are retryable: the
    /// listener logs them and polls again.
    fn poll(&mut self, timeout: Duration) -> PollFuture<'_, Self::Message>;

    /// Close the consumer, releasing its broker resources.
    fn close(self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumer_error_is_cloneable() {
        let error = ConsumerError::TransportError("broker down".to_string());
        let copy = error.clone();
        assert_eq!(copy.to_string(), "Transport error: broker down");
    }

    #[test]
    fn subscription_error_lists_topics() {
        let error = ConsumerError::SubscriptionFailed {
            topics: vec!["orders".to_string()],
            reason: "no such topic".to_string(),
        };
        assert!(error.to_string().contains("orders"));
    }
}
