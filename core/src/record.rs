//! Record types delivered by a broker consumer.
//!
//! A poll call yields a [`RecordBatch`]: an ordered sequence of
//! [`ConsumerRecord`]s exactly as the broker delivered them. Batches are
//! produced fresh by each poll and consumed record-by-record; the listener
//! imposes no ordering contract beyond as-delivered-by-broker.

use serde::{Deserialize, Serialize};

/// One record delivered by the broker.
///
/// Carries an optional partitioning key and an opaque payload of the
/// consumer's message type. The listener only ever reads the value; the key
/// is kept for diagnostics and for handlers that want it.
///
/// # Example
///
/// ```
/// use topic_listener_core::ConsumerRecord;
///
/// let record = ConsumerRecord::new(Some("order-42".to_string()), "payload".to_string());
/// assert_eq!(record.key.as_deref(), Some("order-42"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerRecord<M> {
    /// Partitioning key, if the producer set one.
    pub key: Option<String>,
    /// The message payload.
    pub value: M,
}

impl<M> ConsumerRecord<M> {
    /// Create a new record.
    #[must_use]
    pub const fn new(key: Option<String>, value: M) -> Self {
        Self { key, value }
    }

    /// Create a record with no key.
    #[must_use]
    pub const fn keyless(value: M) -> Self {
        Self { key: None, value }
    }
}

/// An ordered batch of records, as returned by one poll call.
///
/// An empty batch is a normal outcome of an idle poll window, not an error.
pub type RecordBatch<M> = Vec<ConsumerRecord<M>>;
