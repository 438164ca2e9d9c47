//! Ticker error types

use thiserror::Error;

use crate::error::{CommonError, ErrorSeverity};

/// Errors returned by [`Ticker`](super::Ticker) lifecycle calls.
#[derive(Debug, Error)]
pub enum TickerError {
    /// Ticker is already running
    #[error("Ticker '{0}' already running")]
    AlreadyRunning(String),

    /// Ticker is not running
    #[error("Ticker '{0}' not running")]
    NotRunning(String),

    /// The background task panicked or was cancelled by the runtime
    #[error("Ticker task join failed: {0}")]
    JoinFailed(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

/// Result alias for ticker operations
pub type TickerResult<T> = Result<T, TickerError>;

crate::impl_error_classification!(TickerError, Common,
    Self::AlreadyRunning(_) | Self::NotRunning(_) => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::JoinFailed(_) => {
        retryable: false,
        severity: ErrorSeverity::Critical,
        critical: true,
    }
);
