//! Resilient client
//!
//! Routes every submitted [`Operation`] through a health state machine.
//! While healthy, requests go straight to the [`Transport`]. Once a request
//! gets no response the client turns unhealthy: reads are rejected as
//! offline and mutations are queued. A [`Ticker`] drives retry passes that
//! drain the queue oldest first and restore health on the first success.
//!
//! Queue and health state sit behind one mutex that is never held across a
//! network call or a user callback.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use resync_common::error::CommonError;
use resync_common::testing::{Clock, SystemClock};
use resync_common::time::TickerStatus;
use resync_common::{Ticker, TickerError};
use resync_domain::{ApiRequest, ApiResponse, ClientSettings, OperationKind};
use tracing::{debug, error, info, instrument, warn};

use super::errors::{ClientError, ClientResult};
use super::outcome::{NetworkHealth, RequestOutcome};
use super::policy::{QueuePolicy, StandardPolicy};
use super::ports::{CacheProcessedCallback, HealthCallback, RequestAuthorizer, Transport};
use super::pump::RetryPump;
use crate::queue::{codec, Operation, OperationQueue};
use crate::retry::{self, RetryStrategy};

struct ClientState {
    health: NetworkHealth,
    queue: OperationQueue,
    backoff_step: u32,
    /// Start and length of the current backoff window.
    backoff_gate: Option<(Instant, Duration)>,
    cached_remaining: usize,
    cache_failure_reported: bool,
}

impl ClientState {
    fn new(capacity: usize) -> Self {
        Self {
            health: NetworkHealth::Healthy,
            queue: OperationQueue::new(capacity),
            backoff_step: 0,
            backoff_gate: None,
            cached_remaining: 0,
            cache_failure_reported: false,
        }
    }

    /// Returns whether the health changed.
    fn set_health(&mut self, health: NetworkHealth) -> bool {
        if self.health == health {
            return false;
        }
        self.health = health;
        true
    }

    fn reset_backoff(&mut self) {
        self.backoff_step = 0;
        self.backoff_gate = None;
    }
}

pub(crate) struct ClientInner<P: QueuePolicy> {
    name: String,
    settings: ClientSettings,
    transport: Arc<dyn Transport>,
    policy: P,
    strategy: Arc<dyn RetryStrategy>,
    clock: Arc<dyn Clock>,
    authorizer: Option<RequestAuthorizer>,
    state: Mutex<ClientState>,
    health_callback: RwLock<Option<HealthCallback>>,
    cache_callback: RwLock<Option<CacheProcessedCallback>>,
    pump: tokio::sync::Mutex<Ticker>,
    pump_status: TickerStatus,
    abort_requested: AtomicBool,
}

/// Builder for [`ResilientClient`].
pub struct ResilientClientBuilder<P: QueuePolicy = StandardPolicy> {
    settings: ClientSettings,
    transport: Arc<dyn Transport>,
    policy: P,
    strategy: Option<Arc<dyn RetryStrategy>>,
    clock: Arc<dyn Clock>,
    authorizer: Option<RequestAuthorizer>,
}

impl<P: QueuePolicy> ResilientClientBuilder<P> {
    /// Replace the queue policy.
    pub fn policy<Q: QueuePolicy>(self, policy: Q) -> ResilientClientBuilder<Q> {
        ResilientClientBuilder {
            settings: self.settings,
            transport: self.transport,
            policy,
            strategy: self.strategy,
            clock: self.clock,
            authorizer: self.authorizer,
        }
    }

    /// Override the strategy named in the settings.
    #[must_use]
    pub fn retry_strategy(mut self, strategy: Arc<dyn RetryStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn authorizer(mut self, authorize: impl Fn(&mut ApiRequest) + Send + Sync + 'static) -> Self {
        self.authorizer = Some(Arc::new(authorize));
        self
    }

    /// # Errors
    ///
    /// Returns [`CommonError::Config`] when the settings fail validation.
    pub fn build(self) -> ClientResult<ResilientClient<P>> {
        let settings = self.settings.normalized();
        settings.validate().map_err(|e| CommonError::config(e.to_string()))?;

        let strategy = self.strategy.unwrap_or_else(|| retry::from_settings(&settings));
        let pump = Ticker::new(format!("{}-retry", settings.client_name));
        let pump_status = pump.status();

        info!(
            client = %settings.client_name,
            base_url = %settings.base_url,
            max_queue_size = settings.max_queue_size,
            strategy = ?strategy,
            "Resilient client created"
        );

        Ok(ResilientClient {
            inner: Arc::new(ClientInner {
                name: settings.client_name.clone(),
                state: Mutex::new(ClientState::new(settings.max_queue_size)),
                settings,
                transport: self.transport,
                policy: self.policy,
                strategy,
                clock: self.clock,
                authorizer: self.authorizer,
                health_callback: RwLock::new(None),
                cache_callback: RwLock::new(None),
                pump: tokio::sync::Mutex::new(pump),
                pump_status,
                abort_requested: AtomicBool::new(false),
            }),
        })
    }
}

/// Queueing API client. Clones share one queue and one retry pump.
pub struct ResilientClient<P: QueuePolicy = StandardPolicy> {
    inner: Arc<ClientInner<P>>,
}

impl<P: QueuePolicy> Clone for ResilientClient<P> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl ResilientClient<StandardPolicy> {
    pub fn builder(settings: ClientSettings, transport: Arc<dyn Transport>) -> ResilientClientBuilder {
        ResilientClientBuilder {
            settings,
            transport,
            policy: StandardPolicy,
            strategy: None,
            clock: Arc::new(SystemClock),
            authorizer: None,
        }
    }

    /// Client with the standard policy and the strategy from `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`CommonError::Config`] when the settings fail validation.
    pub fn new(settings: ClientSettings, transport: Arc<dyn Transport>) -> ClientResult<Self> {
        Self::builder(settings, transport).build()
    }
}

impl<P: QueuePolicy> ResilientClient<P> {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }

    pub fn health(&self) -> NetworkHealth {
        self.inner.state.lock().health
    }

    pub fn is_healthy(&self) -> bool {
        self.health().is_healthy()
    }

    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Unique keys of the queued operations in queue order.
    pub fn pending_keys(&self) -> Vec<String> {
        self.inner.state.lock().queue.iter().map(Operation::unique_key).collect()
    }

    pub fn is_pump_running(&self) -> bool {
        self.inner.pump_status.is_running()
    }

    /// Operation for this client with the configured attempt cap.
    pub fn operation(
        &self,
        kind: OperationKind,
        group_key: impl Into<String>,
        item_key: impl Into<String>,
        request: ApiRequest,
    ) -> Operation {
        Operation::new(kind, group_key, item_key, request)
            .with_max_attempts(self.inner.settings.max_attempts)
    }

    pub fn set_network_health_callback(&self, callback: impl Fn(bool) + Send + Sync + 'static) {
        *self.inner.health_callback.write() = Some(Arc::new(callback));
    }

    pub fn set_cache_processed_callback(&self, callback: impl Fn(bool) + Send + Sync + 'static) {
        *self.inner.cache_callback.write() = Some(Arc::new(callback));
    }

    /// Send `operation` now or queue it, depending on health and the pump.
    ///
    /// Callbacks fire for operations that end after a network attempt.
    /// Errors that keep an operation from being accepted (offline read, full
    /// queue) are only returned.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Offline`] for reads while unhealthy
    /// - [`ClientError::QueueFull`] when the operation had to be queued
    /// - [`ClientError::Unreachable`], [`ClientError::RequestFailed`] or
    ///   [`ClientError::AttemptsExhausted`] for a failed immediate attempt
    #[instrument(skip_all, fields(client = %self.inner.name, kind = %operation.kind, key = %operation.unique_key()))]
    pub async fn submit(&self, mut operation: Operation) -> ClientResult<RequestOutcome> {
        let inner = &self.inner;
        if operation.enqueued_at == 0 {
            operation.enqueued_at = inner.clock.millis_since_epoch();
        }
        let pump_running = inner.pump_status.is_running();

        if operation.is_async && pump_running {
            inner.enqueue(operation)?;
            return Ok(RequestOutcome::Enqueued);
        }

        let health = inner.state.lock().health;
        if !health.is_healthy() && pump_running {
            if !inner.policy.should_enqueue_while_unhealthy(&operation) {
                debug!("Client offline, rejecting operation");
                return Err(ClientError::Offline);
            }
            inner.enqueue(operation)?;
            return Ok(RequestOutcome::Enqueued);
        }

        let response = inner.attempt(&mut operation).await;
        if operation.is_success(&response) {
            inner.record_success();
            operation.succeed(&response);
            return Ok(RequestOutcome::Completed(response));
        }

        if pump_running && inner.policy.is_retryable(&operation, &response) {
            inner.record_retryable_failure(&response);
            inner.enqueue(operation)?;
            return Ok(RequestOutcome::AttemptedAndEnqueued(response));
        }

        if !response.status.is_response() {
            inner.transition(NetworkHealth::Unhealthy);
        }
        let error = inner.failure_for(&operation, response);
        warn!(error = %error, "Request failed");
        operation.fail(&error);
        Err(error)
    }

    /// Run one retry pass now, outside the pump schedule.
    pub async fn retry_pending(&self) {
        self.inner.retry_pass().await;
    }

    /// Start the retry pump at the configured interval. Starting a running
    /// pump is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Ticker`] if the pump cannot be spawned.
    pub async fn start_retry_pump(&self) -> ClientResult<()> {
        let mut pump = self.inner.pump.lock().await;
        if pump.is_running() {
            debug!(client = %self.inner.name, "Retry pump already running");
            return Ok(());
        }

        self.inner.state.lock().reset_backoff();
        pump.start(self.inner.settings.retry_interval(), RetryPump::new(Arc::downgrade(&self.inner)))?;
        info!(client = %self.inner.name, "Retry pump started");
        Ok(())
    }

    /// Stop the retry pump and wait for an in-flight pass to finish. A pass
    /// in progress stops before its next operation; unprocessed operations
    /// stay queued.
    ///
    /// Must not be awaited from an operation callback.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Ticker`] if the pump task panicked.
    pub async fn stop_retry_pump(&self) -> ClientResult<()> {
        let mut pump = self.inner.pump.lock().await;
        self.inner.abort_requested.store(true, Ordering::Release);
        let stopped = pump.stop().await;
        self.inner.abort_requested.store(false, Ordering::Release);

        match stopped {
            Ok(()) => {
                info!(client = %self.inner.name, "Retry pump stopped");
                Ok(())
            }
            Err(TickerError::NotRunning(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop every queued operation without invoking callbacks.
    pub fn clear_queue(&self) -> usize {
        let removed = {
            let mut state = self.inner.state.lock();
            state.cached_remaining = 0;
            state.queue.clear()
        };
        info!(client = %self.inner.name, removed, "Pending queue cleared");
        removed
    }

    /// Drop only the operations that were loaded from a cache file.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::PumpRunning`] while the retry pump runs.
    pub fn drop_cached_operations(&self) -> ClientResult<usize> {
        self.ensure_pump_stopped()?;
        let removed = {
            let mut state = self.inner.state.lock();
            state.cached_remaining = 0;
            state.cache_failure_reported = false;
            state.queue.retain(|op| !op.from_cache)
        };
        info!(client = %self.inner.name, removed, "Dropped cached operations");
        Ok(removed)
    }

    /// Write the queue, unfiltered and in order, to `path`. Returns the
    /// number of operations written; an empty queue writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::PumpRunning`] while the retry pump runs, or a
    /// persistence error if the file cannot be written.
    #[instrument(skip(self, path), fields(client = %self.inner.name, path = %path.as_ref().display()))]
    pub async fn persist_to_cache(&self, path: impl AsRef<Path>, clear_queue: bool) -> ClientResult<usize> {
        let path = path.as_ref();
        self.ensure_pump_stopped()?;

        let (count, bytes) = {
            let state = self.inner.state.lock();
            if state.queue.is_empty() {
                debug!("Nothing to persist");
                return Ok(0);
            }
            (state.queue.len(), codec::encode(state.queue.iter())?)
        };

        write_atomically(path, &bytes)
            .await
            .map_err(|e| CommonError::persistence_op("write cache", e.to_string()))?;

        if clear_queue {
            let mut state = self.inner.state.lock();
            state.queue.clear();
            state.cached_remaining = 0;
        }
        info!(count, bytes = bytes.len(), "Persisted pending operations");
        Ok(count)
    }

    /// Queue the operations stored at `path` ahead of the live ones, keeping
    /// their file order. Nothing is queued unless the whole file decodes.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::PumpRunning`] while the retry pump runs,
    /// [`ClientError::CacheFormat`] for an empty or malformed file, or a
    /// persistence error if the file cannot be read.
    #[instrument(skip(self, path), fields(client = %self.inner.name, path = %path.as_ref().display()))]
    pub async fn load_from_cache(&self, path: impl AsRef<Path>, delete_file: bool) -> ClientResult<usize> {
        let path = path.as_ref();
        self.ensure_pump_stopped()?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| CommonError::persistence_op("read cache", e.to_string()))?;
        let mut operations = codec::decode(&bytes)?;
        for op in &mut operations {
            op.from_cache = true;
        }
        let count = operations.len();

        {
            let mut state = self.inner.state.lock();
            state.queue.restore_front(operations);
            state.cached_remaining += count;
            state.cache_failure_reported = false;
        }

        if delete_file {
            if let Err(e) = tokio::fs::remove_file(path).await {
                error!(error = %e, "Failed to delete cache file after loading");
            }
        }
        info!(count, "Loaded pending operations from cache");
        Ok(count)
    }

    fn ensure_pump_stopped(&self) -> ClientResult<()> {
        if self.is_pump_running() {
            return Err(ClientError::PumpRunning);
        }
        Ok(())
    }
}

impl<P: QueuePolicy> ClientInner<P> {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// One retry pass: coalesce, then send oldest first until the queue is
    /// drained or a retryable failure halts the pass.
    pub(crate) async fn retry_pass(&self) {
        loop {
            let batch = {
                let mut state = self.state.lock();
                if state.queue.is_empty() {
                    state.reset_backoff();
                    let recovered = state.set_health(NetworkHealth::Healthy);
                    drop(state);
                    if recovered {
                        self.announce_health(NetworkHealth::Healthy);
                    }
                    return;
                }

                if let Some((since, delay)) = state.backoff_gate {
                    if self.clock.now().saturating_duration_since(since) < delay {
                        debug!(client = %self.name, step = state.backoff_step, "Retry pass held back by backoff");
                        return;
                    }
                }

                let pending = state.queue.take_all();
                let taken = pending.len();
                let batch = self.policy.filter_queue(pending);
                state.queue.release_in_flight(taken.saturating_sub(batch.len()));
                batch
            };

            info!(client = %self.name, count = batch.len(), "Retrying pending operations");
            let held = batch.len();
            let mut remaining: VecDeque<Operation> = batch.into();
            let mut drained = true;

            while let Some(mut op) = remaining.pop_front() {
                if self.abort_requested.load(Ordering::Acquire) {
                    debug!(client = %self.name, "Retry pass interrupted by stop");
                    remaining.push_front(op);
                    drained = false;
                    break;
                }

                if op.attempts_exhausted() {
                    let error = ClientError::AttemptsExhausted { attempts: op.attempts_made };
                    warn!(client = %self.name, key = %op.unique_key(), "Dropping operation: {}", error);
                    self.note_cached_result(&op, false);
                    op.fail(&error);
                    continue;
                }

                let response = self.attempt(&mut op).await;
                if op.is_success(&response) {
                    self.record_success();
                    self.note_cached_result(&op, true);
                    op.succeed(&response);
                    continue;
                }

                if self.policy.is_retryable(&op, &response) {
                    debug!(
                        client = %self.name,
                        key = %op.unique_key(),
                        status = %response.status,
                        left = remaining.len() + 1,
                        "Retryable failure, halting pass"
                    );
                    remaining.push_front(op);
                    self.record_retryable_failure(&response);
                    drained = false;
                    break;
                }

                if !response.status.is_response() {
                    self.transition(NetworkHealth::Unhealthy);
                }
                let error = self.failure_for(&op, response);
                warn!(client = %self.name, key = %op.unique_key(), error = %error, "Dropping operation");
                self.note_cached_result(&op, false);
                op.fail(&error);
            }

            self.state.lock().queue.requeue_front(remaining, held);
            if !drained {
                return;
            }

            // Flush whatever was queued while the batch was in flight.
            if self.state.lock().queue.is_empty() {
                return;
            }
        }
    }

    fn enqueue(&self, operation: Operation) -> ClientResult<()> {
        let mut state = self.state.lock();
        let capacity = state.queue.capacity();
        let in_flight = state.queue.in_flight();
        let pushed = state.queue.try_push(operation);
        let queued = state.queue.len();
        drop(state);

        match pushed {
            Ok(()) => {
                debug!(client = %self.name, queued, "Operation queued");
                Ok(())
            }
            Err(rejected) => {
                error!(
                    client = %self.name,
                    key = %rejected.unique_key(),
                    capacity,
                    in_flight,
                    "Pending queue full"
                );
                Err(ClientError::QueueFull { capacity })
            }
        }
    }

    async fn attempt(&self, operation: &mut Operation) -> ApiResponse {
        if let Some(authorize) = &self.authorizer {
            authorize(&mut operation.request);
        }
        operation.attempts_made = operation.attempts_made.saturating_add(1);

        let started = Instant::now();
        let response = self.transport.send(&operation.request).await;
        debug!(
            client = %self.name,
            method = operation.request.method.as_str(),
            uri = %operation.request.uri,
            attempt = operation.attempts_made,
            status = %response.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request attempted"
        );
        response
    }

    fn failure_for(&self, operation: &Operation, response: ApiResponse) -> ClientError {
        if response.status.is_response() {
            return ClientError::RequestFailed { status: response.status, body: response.body };
        }
        if operation.attempts_exhausted() {
            return ClientError::AttemptsExhausted { attempts: operation.attempts_made };
        }
        ClientError::Unreachable {
            reason: format!(
                "no response for {} {}",
                operation.request.method.as_str(),
                operation.request.uri
            ),
        }
    }

    fn record_success(&self) {
        let recovered = {
            let mut state = self.state.lock();
            state.reset_backoff();
            state.set_health(NetworkHealth::Healthy)
        };
        if recovered {
            self.announce_health(NetworkHealth::Healthy);
        }
    }

    fn record_retryable_failure(&self, response: &ApiResponse) {
        let lost = {
            let mut state = self.state.lock();
            let delay = self.strategy.delay(state.backoff_step);
            state.backoff_step = state.backoff_step.saturating_add(1);
            state.backoff_gate = Some((self.clock.now(), delay));
            debug!(
                client = %self.name,
                step = state.backoff_step,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Backing off"
            );
            !response.status.is_response() && state.set_health(NetworkHealth::Unhealthy)
        };
        if lost {
            self.announce_health(NetworkHealth::Unhealthy);
        }
    }

    fn transition(&self, health: NetworkHealth) {
        let changed = self.state.lock().set_health(health);
        if changed {
            self.announce_health(health);
        }
    }

    fn announce_health(&self, health: NetworkHealth) {
        match health {
            NetworkHealth::Healthy => info!(client = %self.name, "Connection restored"),
            NetworkHealth::Unhealthy => warn!(client = %self.name, "Connection lost"),
        }
        let callback = self.health_callback.read().clone();
        if let Some(callback) = callback {
            callback(health.is_healthy());
        }
    }

    fn note_cached_result(&self, operation: &Operation, delivered: bool) {
        if !operation.from_cache {
            return;
        }

        let report = {
            let mut state = self.state.lock();
            if delivered {
                state.cached_remaining = state.cached_remaining.saturating_sub(1);
                (state.cached_remaining == 0 && !state.cache_failure_reported).then_some(true)
            } else if state.cache_failure_reported {
                None
            } else {
                state.cache_failure_reported = true;
                Some(false)
            }
        };

        if let Some(processed) = report {
            info!(client = %self.name, processed, "Cached operations processed");
            let callback = self.cache_callback.read().clone();
            if let Some(callback) = callback {
                callback(processed);
            }
        }
    }
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    tokio::fs::write(&staging, bytes).await?;
    if let Err(e) = tokio::fs::rename(&staging, path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(e);
    }
    Ok(())
}
