//! Client configuration structures

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_EXPONENT, DEFAULT_CLIENT_NAME, DEFAULT_LOG_LEVEL,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_RETRY_INTERVAL_SECS, MAX_BACKOFF_EXPONENT,
};
use crate::errors::{DomainError, Result};
use crate::impl_domain_status_conversions;

/// Which backoff policy gates retry passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategyKind {
    /// `base * 2^attempts`, capped at `backoff_max_exponent` doublings.
    #[default]
    Exponential,
    /// Retry on every tick.
    Constant,
}

impl_domain_status_conversions!(RetryStrategyKind {
    Exponential => "exponential",
    Constant => "constant",
});

/// Tracing output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_LEVEL.to_string(), json: false }
    }
}

/// Settings for one resilient client.
///
/// Every field has a default, so files only need to name what they change.
/// Zero values are treated as "unset" by [`normalized`](Self::normalized).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub client_name: String,
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub retry_interval_secs: u64,
    pub max_queue_size: usize,
    /// Per-operation attempt cap applied when callers do not set one.
    pub max_attempts: u32,
    pub retry_strategy: RetryStrategyKind,
    pub backoff_base_ms: u64,
    pub backoff_max_exponent: u32,
    pub logging: LoggingSettings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            base_url: String::new(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            retry_interval_secs: DEFAULT_RETRY_INTERVAL_SECS,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_strategy: RetryStrategyKind::default(),
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_exponent: DEFAULT_BACKOFF_MAX_EXPONENT,
            logging: LoggingSettings::default(),
        }
    }
}

impl ClientSettings {
    /// Settings for `base_url` with every other field defaulted.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    /// Replace zero or empty values with their defaults.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if self.client_name.trim().is_empty() {
            self.client_name = defaults.client_name;
        }
        if self.request_timeout_ms == 0 {
            self.request_timeout_ms = defaults.request_timeout_ms;
        }
        if self.retry_interval_secs == 0 {
            self.retry_interval_secs = defaults.retry_interval_secs;
        }
        if self.max_queue_size == 0 {
            self.max_queue_size = defaults.max_queue_size;
        }
        if self.max_attempts == 0 {
            self.max_attempts = defaults.max_attempts;
        }
        if self.backoff_base_ms == 0 {
            self.backoff_base_ms = defaults.backoff_base_ms;
        }
        if self.backoff_max_exponent == 0 {
            self.backoff_max_exponent = defaults.backoff_max_exponent;
        }
        if self.logging.level.trim().is_empty() {
            self.logging.level = defaults.logging.level;
        }
        self
    }

    /// Check the settings for values no client can run with.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.client_name.trim().is_empty() {
            return Err(DomainError::Config("client_name must not be empty".to_string()));
        }

        let url = url::Url::parse(&self.base_url).map_err(|e| {
            DomainError::Config(format!("base_url '{}' is invalid: {}", self.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DomainError::Config(format!(
                "base_url scheme must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.backoff_max_exponent > MAX_BACKOFF_EXPONENT {
            return Err(DomainError::Config(format!(
                "backoff_max_exponent must be at most {}",
                MAX_BACKOFF_EXPONENT
            )));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}
