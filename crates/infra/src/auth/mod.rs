//! Credential refresh
//!
//! - **[`refresher`]**: keeps an access token fresh on the shared interval
//!   scheduler and stamps it onto outgoing requests

pub mod refresher;

pub use refresher::{
    refresh_interval, CredentialSource, RefreshedCredentials, TokenRefresher,
    MAX_REFRESH_RETRY_ATTEMPTS, REFRESH_SECONDS_BEFORE_EXPIRATION,
};
