//! Testing utilities and helpers
//!
//! - **[`time`]**: the [`Clock`] abstraction with real and mock
//!   implementations
//! - **`temp`**: temporary cache file locations (`test-utils` feature)

#[cfg(feature = "test-utils")]
pub mod temp;
pub mod time;

#[cfg(feature = "test-utils")]
pub use temp::TempCachePath;
pub use time::{Clock, MockClock, SystemClock};
