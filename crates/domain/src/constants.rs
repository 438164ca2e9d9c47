//! Default values shared by settings, the client and the cache codec.

// Client defaults
pub const DEFAULT_CLIENT_NAME: &str = "resync";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 256;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 32;

// Backoff
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 5_000;
pub const DEFAULT_BACKOFF_MAX_EXPONENT: u32 = 32;
pub const MAX_BACKOFF_EXPONENT: u32 = 63;

/// `max_attempts` value meaning "retry forever".
pub const UNLIMITED_ATTEMPTS: u32 = 0;

// Headers
pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// Stand-in written to the cache instead of a credential.
pub const REDACTED_HEADER_VALUE: &str = "~";

pub const DEFAULT_LOG_LEVEL: &str = "info";
