//! # Topic Listener Core
//!
//! Capability traits and record types for the topic listener.
//!
//! This crate defines the three capabilities a
//! [`TopicListener`](https://docs.rs/topic-listener) composes:
//!
//! - [`BrokerConsumer`](consumer::BrokerConsumer): subscribe to a topic,
//!   poll for record batches, close
//! - [`MessageHandler`](handler::MessageHandler): per-record business logic
//! - [`EventLogger`](events::EventLogger): distinguished operational events
//!
//! ## Architecture Principles
//!
//! - **Explicit capabilities**: every external dependency is a
//!   constructor-supplied trait object or generic parameter, never ambient
//!   state
//! - **Explicit results**: handlers report failure through
//!   [`Result`], not unwinding
//! - **Exclusive consumer ownership**: a broker consumer instance belongs
//!   to exactly one listener worker and is never shared across threads
//!
//! ## Example
//!
//! ```ignore
//! use topic_listener_core::{BrokerConsumer, MessageHandler, HandlerError};
//!
//! struct InventoryHandler;
//!
//! impl MessageHandler for InventoryHandler {
//!     type Message = InventoryUpdate;
//!
//!     fn handle(&self, message: InventoryUpdate) -> Result<(), HandlerError> {
//!         apply_update(&message).map_err(HandlerError::from_source)
//!     }
//! }
//! ```

pub mod consumer;
pub mod events;
pub mod handler;
pub mod record;

// Re-export commonly used items
pub use consumer::{BrokerConsumer, ConsumerError, PollFuture};
pub use events::EventLogger;
pub use handler::{HandlerError, MessageHandler};
pub use record::{ConsumerRecord, RecordBatch};
