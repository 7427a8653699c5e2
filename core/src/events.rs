//! Event logger abstraction for distinguished operational events.
//!
//! The listener reports three notable lifecycle events through this
//! capability instead of an ambient logger, so hosts can route them to
//! whatever alerting or event pipeline they run. No behavioral branching
//! ever depends on logging succeeding.
//!
//! Ordinary per-record diagnostics (record received, handler failed) are
//! emitted directly via `tracing` by the listener; this trait carries only
//! the events worth alerting on.

use crate::consumer::ConsumerError;

/// Structured reporting of the listener's distinguished events.
///
/// Implementations must be cheap and non-blocking: these methods are called
/// from the poll loop's worker.
pub trait EventLogger: Send + Sync {
    /// A poll call failed. The loop logs this and keeps polling.
    fn poll_failed(&self, topic: &str, cause: &ConsumerError);

    /// The worker observed the stop signal and is shutting its loop down.
    fn listener_interrupted(&self, topic: &str);

    /// The worker has been shut down (cleanly or by forced termination).
    fn worker_shutdown(&self, worker_name: &str);
}
