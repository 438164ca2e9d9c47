//! Client error types

use resync_common::error::{CommonError, ErrorSeverity};
use resync_common::TickerError;
use resync_domain::ResponseStatus;
use thiserror::Error;

/// Errors surfaced by [`ResilientClient`](super::ResilientClient) calls and
/// operation failure callbacks.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The client is unhealthy and the operation is not one that may wait
    /// in the queue.
    #[error("Client is offline; operation was not queued")]
    Offline,

    /// No response arrived from the service.
    #[error("Service unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("Pending queue is full ({capacity} operations)")]
    QueueFull { capacity: usize },

    /// The service answered with something other than the expected status.
    #[error("Request failed with {status}")]
    RequestFailed { status: ResponseStatus, body: Vec<u8> },

    #[error("Gave up after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },

    /// Cache and queue maintenance is refused while the retry pump runs.
    #[error("Retry pump is running; stop it first")]
    PumpRunning,

    #[error("Malformed cache file: {0}")]
    CacheFormat(String),

    #[error(transparent)]
    Ticker(#[from] TickerError),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ClientError {
    pub fn cache_format(message: impl Into<String>) -> Self {
        Self::CacheFormat(message.into())
    }

    /// HTTP status of the failed request, when the service answered.
    pub fn status(&self) -> Option<ResponseStatus> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<bincode::Error> for ClientError {
    fn from(err: bincode::Error) -> Self {
        Self::CacheFormat(err.to_string())
    }
}

resync_common::impl_error_conversion!(ClientError, Common);

resync_common::impl_error_classification!(ClientError, Common,
    Self::Offline | Self::Unreachable { .. } | Self::QueueFull { .. } => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::RequestFailed { .. } | Self::AttemptsExhausted { .. } => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::PumpRunning => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::CacheFormat(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::Ticker(_) => {
        retryable: false,
        severity: ErrorSeverity::Critical,
        critical: true,
    }
);

/// Result alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
