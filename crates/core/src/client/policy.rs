//! Queue policies: which operations may wait, which failures are retried,
//! and how the queue is coalesced before a pass.

use resync_domain::{ApiResponse, ResponseStatus};

use crate::queue::{coalesce, coalesce_groups, Operation};

/// Decides what the client queues and retries.
pub trait QueuePolicy: Send + Sync + 'static {
    /// Whether `operation` may be queued while the client is unhealthy.
    /// Reads are rejected as offline by default.
    fn should_enqueue_while_unhealthy(&self, operation: &Operation) -> bool {
        operation.kind.is_mutation()
    }

    /// Whether a failed attempt should stay queued. Called after
    /// `attempts_made` was incremented for the attempt.
    fn is_retryable(&self, operation: &Operation, response: &ApiResponse) -> bool {
        !response.status.is_response()
            && operation.kind.is_mutation()
            && !operation.attempts_exhausted()
    }

    /// Coalesce the queue before a retry pass. The result is processed in
    /// order.
    fn filter_queue(&self, operations: Vec<Operation>) -> Vec<Operation> {
        coalesce(operations)
    }
}

/// Only connectivity failures are retried; coalescing is most recent wins
/// per key.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPolicy;

impl QueuePolicy for StandardPolicy {}

/// Policy for per-player data bundles.
///
/// Throttling and transient server errors are retried as well as
/// connectivity failures, and group-level operations (bundle writes and
/// deletes with an empty item key) are coalesced with
/// [`coalesce_groups`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GameplayDataPolicy;

impl GameplayDataPolicy {
    const RETRYABLE_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

    fn is_transient(status: ResponseStatus) -> bool {
        match status {
            ResponseStatus::RequestNotMade => true,
            ResponseStatus::Http(code) => Self::RETRYABLE_CODES.contains(&code),
        }
    }
}

impl QueuePolicy for GameplayDataPolicy {
    fn is_retryable(&self, operation: &Operation, response: &ApiResponse) -> bool {
        Self::is_transient(response.status)
            && operation.kind.is_mutation()
            && !operation.attempts_exhausted()
    }

    fn filter_queue(&self, operations: Vec<Operation>) -> Vec<Operation> {
        coalesce_groups(operations)
    }
}
