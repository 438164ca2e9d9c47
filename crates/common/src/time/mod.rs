//! Time utilities and abstractions
//!
//! - **[`ticker`]**: restartable interval scheduler with a fixed wake pulse
//! - **Clock abstractions**: real and mock time (re-exported from testing)

pub mod error;
pub mod ticker;

pub use error::{TickerError, TickerResult};
pub use ticker::{
    from_fn, CountdownMode, FnHandler, TickControl, TickHandler, Ticker, TickerStatus, PULSE,
};

// Re-export Clock abstractions from testing module
pub use crate::testing::time::{Clock, MockClock, SystemClock};
