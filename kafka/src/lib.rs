//! Kafka-backed broker consumer for the topic listener.
//!
//! This crate provides [`KafkaBrokerConsumer`], a production implementation
//! of the [`BrokerConsumer`] capability built on rdkafka. It works against
//! Apache Kafka, Redpanda, AWS MSK, or any other Kafka-compatible broker.
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery** with auto-committed offsets:
//! - Offsets advance on the broker's auto-commit cadence regardless of what
//!   the handler does with a record: a handler failure is a logged loss,
//!   not a redelivery. This matches the listener's drop-and-continue
//!   contract; offset management is deliberately out of its scope.
//! - Duplicates are possible after a crash or rebalance; handlers must be
//!   idempotent.
//! - Ordering is guaranteed within a partition.
//!
//! # Payload Format
//!
//! Record values are decoded with bincode into the consumer's message type.
//! Messages within a single topic share one type; bind one consumer (and
//! one listener) per topic.
//!
//! # Example
//!
//! ```no_run
//! use topic_listener_kafka::KafkaBrokerConsumer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let consumer = KafkaBrokerConsumer::<String>::builder()
//!     .brokers("localhost:9092")
//!     .group_id("inventory-service")
//!     .auto_offset_reset("earliest")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::marker::PhantomData;
use std::time::Duration;

use futures::FutureExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use serde::de::DeserializeOwned;

use topic_listener_core::{BrokerConsumer, ConsumerError, ConsumerRecord, PollFuture, RecordBatch};

/// Default session timeout negotiated with the broker.
const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(6);

/// Default cap on records returned by one poll call.
const DEFAULT_MAX_BATCH_SIZE: usize = 500;

/// Kafka implementation of the [`BrokerConsumer`] capability.
///
/// One instance maps to one underlying Kafka consumer and must be owned by
/// exactly one listener: Kafka client objects are not safe for concurrent
/// use, and the [`BrokerConsumer`] contract never requires it.
///
/// # Configuration
///
/// Built via [`builder`](Self::builder):
/// - **Brokers**: bootstrap servers (required)
/// - **Group id**: consumer group (required)
/// - **Offset reset**: where new groups start reading (default: "latest")
/// - **Session timeout**: broker liveness window (default: 6s)
/// - **Max batch size**: cap on records per poll (default: 500)
pub struct KafkaBrokerConsumer<M> {
    consumer: StreamConsumer,
    max_batch_size: usize,
    _marker: PhantomData<fn() -> M>,
}

impl<M> KafkaBrokerConsumer<M> {
    /// Create a new builder for configuring the consumer.
    #[must_use]
    pub fn builder() -> KafkaConsumerBuilder<M> {
        KafkaConsumerBuilder::default()
    }
}

/// Builder for a [`KafkaBrokerConsumer`].
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use topic_listener_kafka::KafkaBrokerConsumer;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let consumer = KafkaBrokerConsumer::<Vec<u8>>::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .group_id("audit-log")
///     .session_timeout(Duration::from_secs(10))
///     .max_batch_size(100)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct KafkaConsumerBuilder<M> {
    brokers: Option<String>,
    group_id: Option<String>,
    auto_offset_reset: Option<String>,
    session_timeout: Option<Duration>,
    max_batch_size: Option<usize>,
    _marker: PhantomData<fn() -> M>,
}

impl<M> Default for KafkaConsumerBuilder<M> {
    fn default() -> Self {
        Self {
            brokers: None,
            group_id: None,
            auto_offset_reset: None,
            session_timeout: None,
            max_batch_size: None,
            _marker: PhantomData,
        }
    }
}

impl<M> KafkaConsumerBuilder<M> {
    /// Set the broker addresses.
    ///
    /// # Parameters
    ///
    /// - `brokers`: Comma-separated list of broker addresses
    ///   (e.g., "localhost:9092")
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the consumer group id.
    ///
    /// Multiple instances of a service sharing a group id share the
    /// workload (consumer group semantics).
    #[must_use]
    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Set the auto offset reset policy for new consumer groups.
    ///
    /// - `"earliest"`: start from the beginning of the topic
    /// - `"latest"`: start from the end (only new records)
    ///
    /// Default: "latest"
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Set the broker session timeout.
    ///
    /// A consumer that stops polling for longer than this is considered
    /// dead and its partitions are rebalanced away. Slow handlers eat into
    /// this window.
    ///
    /// Default: 6 seconds
    #[must_use]
    pub const fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Cap the number of records one poll call may return.
    ///
    /// Default: 500
    ///
    /// # Panics
    ///
    /// Panics if `max_batch_size` is 0.
    #[must_use]
    pub fn max_batch_size(mut self, max_batch_size: usize) -> Self {
        assert!(max_batch_size > 0, "max_batch_size must be greater than 0");
        self.max_batch_size = Some(max_batch_size);
        self
    }

    /// Build the [`KafkaBrokerConsumer`].
    ///
    /// Client creation is lazy on the broker side; this validates the
    /// configuration and allocates the client without connecting.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::ConnectionFailed`] if:
    /// - Brokers or group id are not set
    /// - The client cannot be created from the configuration
    pub fn build(self) -> Result<KafkaBrokerConsumer<M>, ConsumerError> {
        let brokers = self
            .brokers
            .ok_or_else(|| ConsumerError::ConnectionFailed("Brokers not configured".to_string()))?;
        let group_id = self.group_id.ok_or_else(|| {
            ConsumerError::ConnectionFailed("Consumer group not configured".to_string())
        })?;
        let auto_offset_reset = self.auto_offset_reset.as_deref().unwrap_or("latest");
        let session_timeout = self.session_timeout.unwrap_or(DEFAULT_SESSION_TIMEOUT);

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("group.id", &group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", auto_offset_reset)
            .set("session.timeout.ms", session_timeout.as_millis().to_string())
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| {
                ConsumerError::ConnectionFailed(format!("Failed to create consumer: {e}"))
            })?;

        tracing::info!(
            brokers = %brokers,
            group = %group_id,
            auto_offset_reset = auto_offset_reset,
            max_batch_size = self.max_batch_size.unwrap_or(DEFAULT_MAX_BATCH_SIZE),
            "Kafka consumer created"
        );

        Ok(KafkaBrokerConsumer {
            consumer,
            max_batch_size: self.max_batch_size.unwrap_or(DEFAULT_MAX_BATCH_SIZE),
            _marker: PhantomData,
        })
    }
}

/// Decode one Kafka message into a [`ConsumerRecord`].
fn decode_record<M: DeserializeOwned>(
    message: &BorrowedMessage<'_>,
) -> Result<ConsumerRecord<M>, ConsumerError> {
    let payload = message.payload().ok_or_else(|| {
        ConsumerError::DeserializationFailed("Message has no payload".to_string())
    })?;
    let value = bincode::deserialize::<M>(payload).map_err(|e| {
        ConsumerError::DeserializationFailed(format!("Failed to deserialize message value: {e}"))
    })?;
    let key = message
        .key()
        .map(|k| String::from_utf8_lossy(k).into_owned());

    tracing::trace!(
        topic = message.topic(),
        partition = message.partition(),
        offset = message.offset(),
        "Received message"
    );

    Ok(ConsumerRecord::new(key, value))
}

impl<M> BrokerConsumer for KafkaBrokerConsumer<M>
where
    M: DeserializeOwned + Send + 'static,
{
    type Message = M;

    fn subscribe(&mut self, topics: &[&str]) -> Result<(), ConsumerError> {
        self.consumer.subscribe(topics).map_err(|e| {
            ConsumerError::SubscriptionFailed {
                topics: topics.iter().map(|s| (*s).to_string()).collect(),
                reason: e.to_string(),
            }
        })
    }

    /// Wait up to `timeout` for the first record, then drain whatever the
    /// client has already buffered, without further waiting, up to the
    /// configured batch cap. An idle window yields an empty batch.
    fn poll(&mut self, timeout: Duration) -> PollFuture<'_, M> {
        Box::pin(async move {
            let mut records = RecordBatch::new();

            match tokio::time::timeout(timeout, self.consumer.recv()).await {
                Err(_elapsed) => return Ok(records),
                Ok(Err(e)) => {
                    return Err(ConsumerError::TransportError(format!(
                        "Failed to receive message: {e}"
                    )));
                },
                Ok(Ok(message)) => records.push(decode_record::<M>(&message)?),
            }

            while records.len() < self.max_batch_size {
                match self.consumer.recv().now_or_never() {
                    Some(Ok(message)) => records.push(decode_record::<M>(&message)?),
                    Some(Err(e)) => {
                        return Err(ConsumerError::TransportError(format!(
                            "Failed to receive message: {e}"
                        )));
                    },
                    None => break,
                }
            }

            Ok(records)
        })
    }

    fn close(self) {
        tracing::debug!("Closing Kafka consumer");
        // Dropping the client commits pending auto-commit state and leaves
        // the group.
        drop(self.consumer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kafka_consumer_is_send() {
        fn assert_send<T: Send>() {}

        assert_send::<KafkaBrokerConsumer<String>>();
    }

    #[test]
    fn builder_requires_brokers() {
        let result = KafkaBrokerConsumer::<String>::builder()
            .group_id("test-group")
            .build();
        assert!(matches!(result, Err(ConsumerError::ConnectionFailed(_))));
    }

    #[test]
    fn builder_requires_group_id() {
        let result = KafkaBrokerConsumer::<String>::builder()
            .brokers("localhost:9092")
            .build();
        assert!(matches!(result, Err(ConsumerError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn builder_with_required_fields_creates_client() {
        // Client creation is lazy; no broker needs to be running.
        let result = KafkaBrokerConsumer::<String>::builder()
            .brokers("localhost:9092")
            .group_id("test-group")
            .build();
        assert!(result.is_ok());
    }
}
