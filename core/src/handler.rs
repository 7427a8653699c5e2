//! Message handler abstraction.
//!
//! The [`MessageHandler`] trait is the push side of the listener: one
//! synchronous `handle` call per record, on the listener's worker. A failed
//! record is logged and dropped (no retry, no redelivery), so handlers that
//! cannot afford loss must do their own durable hand-off.
//!
//! Handling runs on the listener's single worker, in delivery order.
//! A slow handler delays the next poll, and brokers may treat a consumer
//! that stops polling as stalled (triggering a group rebalance). Keep
//! handlers fast, or hand work off to your own executor.

use std::error::Error;
use thiserror::Error as ThisError;

/// Error returned by a message handler for one record.
///
/// Carries a human-readable message and an optional source error. The
/// listener logs it and moves on; it never inspects the contents.
#[derive(ThisError, Debug)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl HandlerError {
    /// Create a handler error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a handler error from an underlying cause.
    #[must_use]
    pub fn from_source(source: impl Error + Send + Sync + 'static) -> Self {
        Self {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}

/// Trait for per-record business logic.
///
/// Invoked once per record, synchronously, on the listener's worker, in the
/// order the broker delivered the records.
///
/// # Failure Semantics
///
/// Returning `Err` marks the record as **lost**: the listener logs the
/// failure (with this handler's [`name`](Self::name) and the topic) and
/// continues with the next record. It does not abort the batch or the poll
/// loop.
///
/// # Example
///
/// ```
/// use topic_listener_core::{HandlerError, MessageHandler};
///
/// struct PriceUpdateHandler;
///
/// impl MessageHandler for PriceUpdateHandler {
///     type Message = String;
///
///     fn handle(&self, message: String) -> Result<(), HandlerError> {
///         if message.is_empty() {
///             return Err(HandlerError::new("empty price update"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait MessageHandler: Send + Sync + 'static {
    /// The message payload type this handler accepts.
    type Message: Send + 'static;

    /// Handle one record's payload.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the record cannot be processed; the
    /// record is then dropped.
    fn handle(&self, message: Self::Message) -> Result<(), HandlerError>;

    /// Identity of this handler, used in lost-record diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler;

    impl MessageHandler for NoopHandler {
        type Message = u32;

        fn handle(&self, _message: u32) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn default_name_is_type_name() {
        let handler = NoopHandler;
        assert!(handler.name().ends_with("NoopHandler"));
    }

    #[test]
    fn error_preserves_source() {
        let io = std::io::Error::other("disk full");
        let error = HandlerError::from_source(io);
        assert_eq!(error.to_string(), "disk full");
        assert!(error.source().is_some());
    }
}
