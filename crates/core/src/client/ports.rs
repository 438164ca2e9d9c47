//! Port interfaces the client is wired to

use std::sync::Arc;

use async_trait::async_trait;
use resync_domain::{ApiRequest, ApiResponse};

/// Sends one request to the service.
///
/// Implementations never fail: a request that could not be delivered (no
/// connection, timeout) is reported as [`ApiResponse::not_made`]. Every
/// received HTTP status, success or not, is returned as a response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> ApiResponse;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: &ApiRequest) -> ApiResponse {
        (**self).send(request).await
    }
}

/// Stamps credentials onto a request immediately before every attempt, so
/// queued operations pick up refreshed tokens.
pub type RequestAuthorizer = Arc<dyn Fn(&mut ApiRequest) + Send + Sync>;

/// Receives `true` when the client becomes healthy and `false` when it goes
/// unhealthy. Only called on a change.
pub type HealthCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Receives `true` once every operation loaded from a cache file was
/// delivered, or `false` the first time one of them is dropped.
pub type CacheProcessedCallback = Arc<dyn Fn(bool) + Send + Sync>;
