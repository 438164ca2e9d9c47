//! # Resync Core
//!
//! The queueing engine behind the resilient client - no HTTP or filesystem
//! configuration code.
//!
//! This crate contains:
//! - The [`Operation`] model and its bounded queue with coalescing
//! - Retry strategies and queue policies
//! - The binary cache codec
//! - [`ResilientClient`], which routes requests by network health and drains
//!   the queue from a retry pump
//!
//! ## Architecture Principles
//! - Depends on `resync-common` and `resync-domain` only
//! - The network is reached through the [`Transport`] port

pub mod client;
pub mod queue;
pub mod retry;

pub use client::{
    ClientError, ClientResult, GameplayDataPolicy, NetworkHealth, QueuePolicy, RequestAuthorizer,
    RequestOutcome, ResilientClient, ResilientClientBuilder, StandardPolicy, Transport,
};
pub use queue::{Operation, OperationQueue};
pub use retry::{ConstantInterval, ExponentialBackoff, RetryStrategy};
