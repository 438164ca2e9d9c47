//! # Resync Domain
//!
//! Plain data shared by every resync layer.
//!
//! This crate contains:
//! - Request and response values exchanged with the transport
//! - Client settings and their defaults
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other resync crates
//! - Pure data structures; no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
