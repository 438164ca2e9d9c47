//! Conversions from external infrastructure errors into layer errors.

use reqwest::Error as HttpError;
use resync_domain::DomainError;

use super::{ConfigError, RefreshError};

/* -------------------------------------------------------------------------- */
/* reqwest::Error */
/* -------------------------------------------------------------------------- */

/// Whether `err` means no response was obtained, as opposed to a response
/// that could not be read.
pub fn is_no_response(err: &HttpError) -> bool {
    if err.is_timeout() || err.is_request() || err.is_builder() {
        return true;
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        if err.is_connect() {
            return true;
        }
    }
    false
}

/// Short, log-friendly description of a transport failure.
pub fn describe(err: &HttpError) -> String {
    if err.is_timeout() {
        return "HTTP request timed out".into();
    }

    #[cfg(not(target_arch = "wasm32"))]
    if err.is_connect() {
        return "HTTP connection failure".into();
    }

    if let Some(status) = err.status() {
        return format!(
            "HTTP {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("unknown status")
        );
    }

    err.to_string()
}

impl From<HttpError> for RefreshError {
    fn from(err: HttpError) -> Self {
        if is_no_response(&err) {
            Self::Unreachable(describe(&err))
        } else {
            Self::Rejected(describe(&err))
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Parsing and validation */
/* -------------------------------------------------------------------------- */

impl From<DomainError> for ConfigError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Config(message) | DomainError::InvalidInput(message) => {
                Self::Invalid(message)
            }
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse { format: "TOML", reason: err.to_string() }
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
