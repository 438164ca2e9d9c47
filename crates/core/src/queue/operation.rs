//! One unit of pending work: a request plus its retry bookkeeping.

use std::fmt;

use resync_domain::constants::{DEFAULT_MAX_ATTEMPTS, UNLIMITED_ATTEMPTS};
use resync_domain::{ApiRequest, ApiResponse, OperationKind, ResponseStatus};

use crate::client::errors::ClientError;

/// Called once with the response when an operation succeeds.
pub type SuccessCallback = Box<dyn FnOnce(&ApiResponse) + Send>;

/// Called once with the reason when an operation is given up on.
pub type FailureCallback = Box<dyn FnOnce(&ClientError) + Send>;

/// A request targeting one logical resource, plus everything needed to
/// retry it later.
///
/// `group_key` and `item_key` name the resource (for example a bundle and an
/// item inside it). Two operations with the same [`unique_key`] target the
/// same resource and are coalesced in the queue.
///
/// [`unique_key`]: Operation::unique_key
pub struct Operation {
    pub kind: OperationKind,
    pub group_key: String,
    pub item_key: String,
    pub request: ApiRequest,
    pub expected_status: ResponseStatus,
    /// Attempt cap; [`UNLIMITED_ATTEMPTS`] means no cap.
    pub max_attempts: u32,
    pub attempts_made: u32,
    /// Milliseconds since the UNIX epoch; stamped by the client on submit
    /// when left at zero.
    pub enqueued_at: u64,
    pub is_async: bool,
    /// Set for operations restored from a cache file.
    pub from_cache: bool,
    on_success: Option<SuccessCallback>,
    on_failure: Option<FailureCallback>,
}

impl Operation {
    pub fn new(
        kind: OperationKind,
        group_key: impl Into<String>,
        item_key: impl Into<String>,
        request: ApiRequest,
    ) -> Self {
        Self {
            kind,
            group_key: group_key.into(),
            item_key: item_key.into(),
            request,
            expected_status: ResponseStatus::OK,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempts_made: 0,
            enqueued_at: 0,
            is_async: false,
            from_cache: false,
            on_success: None,
            on_failure: None,
        }
    }

    pub fn write(group_key: impl Into<String>, item_key: impl Into<String>, request: ApiRequest) -> Self {
        Self::new(OperationKind::Write, group_key, item_key, request)
    }

    pub fn delete(group_key: impl Into<String>, item_key: impl Into<String>, request: ApiRequest) -> Self {
        Self::new(OperationKind::Delete, group_key, item_key, request)
    }

    pub fn read(group_key: impl Into<String>, item_key: impl Into<String>, request: ApiRequest) -> Self {
        Self::new(OperationKind::Read, group_key, item_key, request)
    }

    #[must_use]
    pub fn expecting(mut self, status: ResponseStatus) -> Self {
        self.expected_status = status;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn unlimited_attempts(self) -> Self {
        self.with_max_attempts(UNLIMITED_ATTEMPTS)
    }

    #[must_use]
    pub fn enqueued_at(mut self, millis: u64) -> Self {
        self.enqueued_at = millis;
        self
    }

    /// Deliver the result through callbacks instead of waiting for it. While
    /// the retry pump runs, asynchronous operations go straight to the queue.
    #[must_use]
    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    #[must_use]
    pub fn on_success(mut self, callback: impl FnOnce(&ApiResponse) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_failure(mut self, callback: impl FnOnce(&ClientError) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(callback));
        self
    }

    /// `group_key + "/" + item_key`.
    pub fn unique_key(&self) -> String {
        format!("{}/{}", self.group_key, self.item_key)
    }

    /// Operations with an empty item key act on the whole group.
    pub fn is_group_level(&self) -> bool {
        self.item_key.is_empty()
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.max_attempts != UNLIMITED_ATTEMPTS && self.attempts_made >= self.max_attempts
    }

    pub fn is_success(&self, response: &ApiResponse) -> bool {
        response.status == self.expected_status
    }

    pub(crate) fn succeed(mut self, response: &ApiResponse) {
        if let Some(callback) = self.on_success.take() {
            callback(response);
        }
    }

    pub(crate) fn fail(mut self, error: &ClientError) {
        if let Some(callback) = self.on_failure.take() {
            callback(error);
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("kind", &self.kind)
            .field("key", &self.unique_key())
            .field("method", &self.request.method)
            .field("uri", &self.request.uri)
            .field("expected_status", &self.expected_status)
            .field("max_attempts", &self.max_attempts)
            .field("attempts_made", &self.attempts_made)
            .field("enqueued_at", &self.enqueued_at)
            .field("is_async", &self.is_async)
            .field("from_cache", &self.from_cache)
            .finish_non_exhaustive()
    }
}

/// Data fields only; callbacks are not comparable.
impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.group_key == other.group_key
            && self.item_key == other.item_key
            && self.request == other.request
            && self.expected_status == other.expected_status
            && self.max_attempts == other.max_attempts
            && self.attempts_made == other.attempts_made
            && self.enqueued_at == other.enqueued_at
            && self.is_async == other.is_async
            && self.from_cache == other.from_cache
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_unique_key_joins_group_and_item() {
        let op = Operation::write("stats", "level", ApiRequest::post("/bundles/stats/level"));
        assert_eq!(op.unique_key(), "stats/level");
        assert!(!op.is_group_level());

        let bundle = Operation::delete("stats", "", ApiRequest::delete("/bundles/stats"));
        assert_eq!(bundle.unique_key(), "stats/");
        assert!(bundle.is_group_level());
    }

    /// Validates `Operation::attempts_exhausted` behavior for the capped and
    /// unlimited scenarios.
    ///
    /// Assertions:
    /// - Ensures a capped operation is exhausted once attempts reach the cap.
    /// - Ensures an unlimited operation never is.
    #[test]
    fn test_attempts_exhausted() {
        let mut capped = Operation::write("g", "i", ApiRequest::post("/g/i")).with_max_attempts(2);
        capped.attempts_made = 1;
        assert!(!capped.attempts_exhausted());
        capped.attempts_made = 2;
        assert!(capped.attempts_exhausted());

        let mut unlimited = Operation::write("g", "i", ApiRequest::post("/g/i")).unlimited_attempts();
        unlimited.attempts_made = u32::MAX;
        assert!(!unlimited.attempts_exhausted());
    }

    #[test]
    fn test_success_matches_expected_status_only() {
        let op = Operation::delete("g", "i", ApiRequest::delete("/g/i"))
            .expecting(ResponseStatus::NO_CONTENT);
        assert!(op.is_success(&ApiResponse::new(204, Vec::new())));
        assert!(!op.is_success(&ApiResponse::new(200, Vec::new())));
        assert!(!op.is_success(&ApiResponse::not_made()));
    }

    #[test]
    fn test_callbacks_fire_once() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let op = Operation::write("g", "i", ApiRequest::post("/g/i"))
            .on_success(move |_| flag.store(true, Ordering::SeqCst))
            .on_failure(|_| panic!("failure callback must not run"));

        op.succeed(&ApiResponse::new(200, Vec::new()));
        assert!(fired.load(Ordering::SeqCst));
    }
}
