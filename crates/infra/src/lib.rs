//! # Resync Infrastructure
//!
//! Implementations of the ports defined in `resync-core`, plus the process
//! plumbing around them.
//!
//! This crate contains:
//! - [`http::ReqwestTransport`], the production [`Transport`](resync_core::Transport)
//! - Settings loading from the environment or TOML/JSON files
//! - Tracing subscriber setup
//! - A credential refresher driven by the shared interval scheduler
//!
//! ## Architecture
//! - Implements traits defined in `resync-core`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod auth;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use auth::{CredentialSource, RefreshedCredentials, TokenRefresher};
pub use errors::{ConfigError, RefreshError};
pub use http::ReqwestTransport;
pub use observability::init_tracing;
