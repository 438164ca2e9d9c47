//! Error types for the infrastructure layer

pub mod conversions;

use resync_common::error::{CommonError, ErrorSeverity};
use resync_common::TickerError;
use thiserror::Error;

/// Failures while loading [`ClientSettings`](resync_domain::ClientSettings).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("No config file found in any of the standard locations")]
    NoConfigFile,

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid {format} format: {reason}")]
    Parse { format: &'static str, reason: String },

    /// The settings parsed but cannot be used.
    #[error("Invalid settings: {0}")]
    Invalid(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ConfigError {
    pub fn invalid_value(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidValue { key: key.into(), reason: reason.to_string() }
    }
}

resync_common::impl_error_conversion!(ConfigError, Common);

resync_common::impl_error_classification!(ConfigError, Common,
    Self::MissingVar(_)
    | Self::InvalidValue { .. }
    | Self::FileNotFound(_)
    | Self::NoConfigFile
    | Self::UnsupportedFormat(_)
    | Self::Parse { .. }
    | Self::Invalid(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    }
);

/// Failures of a credential refresh.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("No refresh token present")]
    NoRefreshToken,

    /// The credential service answered and refused the refresh token.
    #[error("Credential refresh rejected: {0}")]
    Rejected(String),

    /// No answer from the credential service.
    #[error("Credential service unreachable: {0}")]
    Unreachable(String),

    #[error(transparent)]
    Ticker(#[from] TickerError),

    #[error(transparent)]
    Common(#[from] CommonError),
}

resync_common::impl_error_conversion!(RefreshError, Common);

resync_common::impl_error_classification!(RefreshError, Common,
    Self::Unreachable(_) => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::NoRefreshToken | Self::Rejected(_) => {
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

/// Result alias for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;
