//! Shared test helpers for `resync-core` integration tests.
//!
//! Provides a scripted in-memory transport and a callback recorder so the
//! client tests can focus on routing and retry behaviour.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use resync_core::{Operation, QueuePolicy, ResilientClient, Transport};
use resync_domain::{ApiRequest, ApiResponse, ClientSettings, RetryStrategyKind};

/// In-memory mock for the `Transport` port.
///
/// Answers from a script of queued responses first, then with the fallback.
/// Every request is recorded in send order. A held transport parks the next
/// request until the gate returned by [`ScriptedTransport::hold_next`] is
/// notified.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<ApiResponse>>,
    fallback: Mutex<ApiResponse>,
    sent: Mutex<Vec<ApiRequest>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedTransport {
    /// A transport that answers 200 to everything.
    pub fn online() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(ApiResponse::new(200, Vec::new())),
            sent: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        })
    }

    /// Park the next request until the returned gate is notified.
    pub fn hold_next(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    /// Queue one response ahead of the fallback.
    pub fn then(&self, response: ApiResponse) {
        self.script.lock().push_back(response);
    }

    pub fn go_offline(&self) {
        *self.fallback.lock() = ApiResponse::not_made();
    }

    pub fn go_online(&self) {
        *self.fallback.lock() = ApiResponse::new(200, Vec::new());
    }

    pub fn sent(&self) -> Vec<ApiRequest> {
        self.sent.lock().clone()
    }

    /// `"METHOD uri"` for every request sent so far.
    pub fn sent_lines(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|request| format!("{} {}", request.method.as_str(), request.uri))
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn forget_sent(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> ApiResponse {
        self.sent.lock().push(request.clone());
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| self.fallback.lock().clone())
    }
}

/// Records callback invocations in the order they happen.
#[derive(Clone, Default)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Settings with a one second pump and no backoff between passes.
pub fn settings() -> ClientSettings {
    ClientSettings {
        client_name: "test-client".to_string(),
        retry_interval_secs: 1,
        retry_strategy: RetryStrategyKind::Constant,
        ..ClientSettings::for_base_url("http://localhost:8080")
    }
}

/// Attach callbacks that record `ok:<key>` or `err:<key>:<error>`.
pub fn tracked(op: Operation, events: &Events) -> Operation {
    let key = op.unique_key();
    let ok_events = events.clone();
    let ok_key = key.clone();
    let err_events = events.clone();
    op.on_success(move |_| ok_events.push(format!("ok:{ok_key}")))
        .on_failure(move |error| err_events.push(format!("err:{key}:{error}")))
}

pub fn write(group: &str, item: &str) -> Operation {
    Operation::write(group, item, ApiRequest::post(format!("/bundles/{group}/{item}")))
}

pub fn delete(group: &str, item: &str) -> Operation {
    Operation::delete(group, item, ApiRequest::delete(format!("/bundles/{group}/{item}")))
}

/// Start the pump and knock the client offline with a failed read, leaving
/// the queue empty and the sent log cleared.
pub async fn offline_with_pump<P: QueuePolicy>(client: &ResilientClient<P>, transport: &ScriptedTransport) {
    client.start_retry_pump().await.expect("pump starts");
    transport.go_offline();
    let probe = Operation::read("probe", "", ApiRequest::get("/probe"));
    let _ = client.submit(probe).await;
    assert!(!client.is_healthy(), "client should be offline after a failed read");
    transport.forget_sent();
}
