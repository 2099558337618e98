//! Error types for Sluice.

use std::sync::Arc;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SluiceError>;

/// Error type returned by event handlers and result-cell tasks.
///
/// These are caller failures: the ring routes them to the exception handler
/// and the result cell stores them as the computation's outcome.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Shared cause of a failed result-cell computation.
pub type TaskError = Arc<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum SluiceError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// The ring is full and `try_next` cannot claim without wrapping.
    #[error("insufficient capacity in ring")]
    InsufficientCapacity,

    /// The sequence barrier has been alerted (shutdown signal).
    #[error("sequence barrier alerted")]
    Alerted,

    #[error("operation timed out")]
    Timeout,

    /// Cooperative cancellation signal observed at a polling point.
    #[error("interrupted")]
    Interrupted,

    /// A result-cell computation failed; wraps the cause.
    #[error("computation failed: {0}")]
    Execution(TaskError),

    /// The result cell was cancelled before the computation completed.
    #[error("computation cancelled")]
    Cancelled,
}

impl SluiceError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState { message: message.into() }
    }

    /// Check if this error is recoverable by retrying the operation
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InsufficientCapacity | Self::Timeout)
    }

    /// Check if this error terminates a processor's wait (alert or shutdown)
    pub fn is_alert(&self) -> bool {
        matches!(self, Self::Alerted)
    }
}
