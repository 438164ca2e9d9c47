use std::fmt;

use resync_domain::ApiResponse;

/// Connectivity state as last observed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkHealth {
    #[default]
    Healthy,
    /// The last attempt got no response; mutations are queued instead of
    /// sent until a retry pass succeeds.
    Unhealthy,
}

impl NetworkHealth {
    pub fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl fmt::Display for NetworkHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// What happened to a submitted operation that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Sent and answered with the expected status.
    Completed(ApiResponse),
    /// Accepted into the queue without a network attempt. The result
    /// arrives through the operation's callbacks.
    Enqueued,
    /// Sent, failed in a retryable way, and queued for the retry pump.
    AttemptedAndEnqueued(ApiResponse),
}

impl RequestOutcome {
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            Self::Completed(response) | Self::AttemptedAndEnqueued(response) => Some(response),
            Self::Enqueued => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self, Self::Completed(_))
    }
}
