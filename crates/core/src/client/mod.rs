//! Resilient client: request routing, retry pump, and cache persistence.

pub mod errors;
pub mod outcome;
pub mod policy;
pub mod ports;
mod pump;
pub mod resilient;

pub use errors::{ClientError, ClientResult};
pub use outcome::{NetworkHealth, RequestOutcome};
pub use policy::{GameplayDataPolicy, QueuePolicy, StandardPolicy};
pub use ports::{CacheProcessedCallback, HealthCallback, RequestAuthorizer, Transport};
pub use resilient::{ResilientClient, ResilientClientBuilder};
