//! Error types for the renderq command-queue subsystem
//!
//! This module contains all error types used throughout the core crate:
//! result-retrieval errors on `AsyncOp` handles, queue hand-off errors, and
//! the main `CoreQueueError` type that unifies them.
//!
//! Queuing-discipline violations (calling into a single-producer queue from
//! a foreign thread, or blocking on a handle from the only thread that could
//! complete it) are structural bugs and are *not* represented here — they
//! fail fast with a panic after an `error!` trace.

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Errors reported when reading a value out of an [`AsyncOp`] handle.
///
/// [`AsyncOp`]: crate::AsyncOp
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AsyncOpError {
    /// The operation has not executed yet. Recoverable: retry later, or call
    /// `wait()` first.
    #[error("async operation has not completed yet")]
    NotReady,

    /// The stored value is not of the requested type.
    #[error("async operation holds a `{actual}`, but `{requested}` was requested")]
    TypeMismatch {
        requested: &'static str,
        actual: &'static str,
    },

    /// The command backing this operation was discarded before it executed
    /// (local cancellation or queue shutdown). No value will ever arrive.
    #[error("async operation was cancelled before it executed")]
    Cancelled,
}

/// Errors reported on the queue hand-off path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The core thread has shut down; flushed commands were discarded and
    /// their handles cancelled.
    #[error("core thread has stopped; commands were not submitted")]
    CoreThreadStopped,

    /// The core thread terminated abnormally (a command body panicked).
    #[error("core thread panicked while executing commands")]
    CoreThreadPanicked,
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error type for the renderq subsystem
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreQueueError {
    #[error("async operation error: {0}")]
    AsyncOp(#[from] AsyncOpError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Configuration error
    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl CoreQueueError {
    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        CoreQueueError::Configuration {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, CoreQueueError>;
