//! Retry pacing

pub mod strategy;

pub use strategy::{from_settings, ConstantInterval, ExponentialBackoff, Jitter, RetryStrategy};
