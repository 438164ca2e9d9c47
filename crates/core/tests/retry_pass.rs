//! Retry pass ordering, coalescing, health recovery, and backoff.

mod support;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use resync_common::testing::{Clock, MockClock};
use resync_core::{
    ClientError, ExponentialBackoff, GameplayDataPolicy, NetworkHealth, Operation, ResilientClient,
};
use resync_domain::{ApiRequest, ApiResponse, ClientSettings, RetryStrategyKind};
use support::{delete, offline_with_pump, settings, tracked, write, Events, ScriptedTransport};

fn client(transport: &Arc<ScriptedTransport>) -> ResilientClient {
    ResilientClient::new(settings(), transport.clone()).expect("valid settings")
}

/// Wall clock that can be set to any epoch millisecond, including backwards.
#[derive(Default)]
struct SteppingClock {
    millis: AtomicU64,
}

impl SteppingClock {
    fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

/// Validates retry pass ordering for the all-succeed scenario.
///
/// Assertions:
/// - Ensures operations on distinct keys are sent in enqueue order.
/// - Ensures callbacks fire in the same order and the queue drains.
/// - Ensures the client becomes healthy with one notification.
#[tokio::test(start_paused = true)]
async fn pass_sends_oldest_first_and_restores_health() {
    let transport = ScriptedTransport::online();
    let client = client(&transport);
    offline_with_pump(&client, &transport).await;
    let health = Events::default();
    let recorder = health.clone();
    client.set_network_health_callback(move |healthy| recorder.push(format!("healthy={healthy}")));
    let events = Events::default();

    for item in ["a", "b", "c"] {
        client.submit(tracked(write("stats", item), &events)).await.unwrap();
    }
    transport.go_online();
    client.retry_pending().await;

    assert_eq!(
        transport.sent_lines(),
        vec!["POST /bundles/stats/a", "POST /bundles/stats/b", "POST /bundles/stats/c"]
    );
    assert_eq!(events.snapshot(), vec!["ok:stats/a", "ok:stats/b", "ok:stats/c"]);
    assert_eq!(client.queue_len(), 0);
    assert_eq!(client.health(), NetworkHealth::Healthy);
    assert_eq!(health.snapshot(), vec!["healthy=true"]);
    client.stop_retry_pump().await.unwrap();
}

/// Validates retry pass ordering for the failure-midway scenario.
///
/// Assertions:
/// - Ensures C is never attempted once B gets no response.
/// - Ensures A is removed and not resent on the next pass.
/// - Ensures B and C stay queued in order.
#[tokio::test(start_paused = true)]
async fn connectivity_failure_halts_pass() {
    let transport = ScriptedTransport::online();
    let client = client(&transport);
    offline_with_pump(&client, &transport).await;
    let events = Events::default();

    for item in ["a", "b", "c"] {
        client.submit(tracked(write("stats", item), &events)).await.unwrap();
    }
    transport.then(ApiResponse::new(200, Vec::new()));
    client.retry_pending().await;

    assert_eq!(transport.sent_lines(), vec!["POST /bundles/stats/a", "POST /bundles/stats/b"]);
    assert_eq!(events.snapshot(), vec!["ok:stats/a"]);
    assert_eq!(client.pending_keys(), vec!["stats/b", "stats/c"]);

    transport.forget_sent();
    transport.go_online();
    client.retry_pending().await;

    assert_eq!(transport.sent_lines(), vec!["POST /bundles/stats/b", "POST /bundles/stats/c"]);
    assert_eq!(events.snapshot(), vec!["ok:stats/a", "ok:stats/b", "ok:stats/c"]);
    client.stop_retry_pump().await.unwrap();
}

/// Validates the write-then-delete coalescing scenario.
///
/// Assertions:
/// - Ensures only the Delete is sent on the next pass.
/// - Ensures only the Delete's success callback fires.
#[tokio::test(start_paused = true)]
async fn newer_delete_supersedes_queued_write() {
    let transport = ScriptedTransport::online();
    let client = client(&transport);
    offline_with_pump(&client, &transport).await;
    let events = Events::default();

    let write_events = Events::default();
    client.submit(tracked(write("stats", "level"), &write_events)).await.unwrap();
    client.submit(tracked(delete("stats", "level"), &events)).await.unwrap();
    assert_eq!(client.queue_len(), 2);

    transport.go_online();
    client.retry_pending().await;

    assert_eq!(transport.sent_lines(), vec!["DELETE /bundles/stats/level"]);
    assert_eq!(events.snapshot(), vec!["ok:stats/level"]);
    assert!(write_events.snapshot().is_empty());
    assert_eq!(client.queue_len(), 0);
    client.stop_retry_pump().await.unwrap();
}

/// Validates the write-then-delete scenario after the wall clock stepped
/// backwards between the two submissions.
///
/// Assertions:
/// - Ensures the later Delete still wins and is the only request sent.
/// - Ensures the superseded Write's callbacks never fire.
#[tokio::test(start_paused = true)]
async fn delete_wins_when_clock_steps_backwards() {
    let transport = ScriptedTransport::online();
    let clock = Arc::new(SteppingClock::default());
    let client = ResilientClient::builder(settings(), transport.clone())
        .clock(clock.clone())
        .build()
        .unwrap();
    offline_with_pump(&client, &transport).await;
    let write_events = Events::default();
    let delete_events = Events::default();

    clock.set(10_000);
    client.submit(tracked(write("stats", "level"), &write_events)).await.unwrap();
    clock.set(9_000);
    client.submit(tracked(delete("stats", "level"), &delete_events)).await.unwrap();

    transport.go_online();
    client.retry_pending().await;

    assert_eq!(transport.sent_lines(), vec!["DELETE /bundles/stats/level"]);
    assert_eq!(delete_events.snapshot(), vec!["ok:stats/level"]);
    assert!(write_events.snapshot().is_empty());
    client.stop_retry_pump().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn repeated_updates_send_only_the_last() {
    let transport = ScriptedTransport::online();
    let client = client(&transport);
    offline_with_pump(&client, &transport).await;

    for n in 0..5 {
        let request = ApiRequest::post(format!("/bundles/stats/level?v={n}"));
        let op = Operation::write("stats", "level", request).enqueued_at(1_000 + n);
        client.submit(op).await.unwrap();
    }
    transport.go_online();
    client.retry_pending().await;

    assert_eq!(transport.sent_lines(), vec!["POST /bundles/stats/level?v=4"]);
}

/// Validates retry pass behavior for the permanent failure scenario.
///
/// Assertions:
/// - Ensures a rejected operation is dropped with its failure callback.
/// - Ensures the pass continues with the next operation.
#[tokio::test(start_paused = true)]
async fn permanent_failure_is_dropped_and_pass_continues() {
    let transport = ScriptedTransport::online();
    let client = client(&transport);
    offline_with_pump(&client, &transport).await;
    let events = Events::default();

    client.submit(tracked(write("stats", "a"), &events)).await.unwrap();
    client.submit(tracked(write("stats", "b"), &events)).await.unwrap();
    transport.go_online();
    transport.then(ApiResponse::new(422, Vec::new()));
    client.retry_pending().await;

    assert_eq!(events.snapshot(), vec!["err:stats/a:Request failed with HTTP 422", "ok:stats/b"]);
    assert_eq!(client.queue_len(), 0);
    assert!(client.is_healthy());
    client.stop_retry_pump().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn attempt_cap_drops_operation() {
    let transport = ScriptedTransport::online();
    let client = client(&transport);
    offline_with_pump(&client, &transport).await;
    let events = Events::default();

    client.submit(tracked(write("stats", "level").with_max_attempts(2), &events)).await.unwrap();
    client.retry_pending().await;
    assert_eq!(client.queue_len(), 1);
    assert!(events.snapshot().is_empty());

    client.retry_pending().await;
    assert_eq!(client.queue_len(), 0);
    assert_eq!(events.snapshot(), vec!["err:stats/level:Gave up after 2 attempts"]);
    assert_eq!(transport.sent_count(), 2);
    client.stop_retry_pump().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn empty_queue_resets_health() {
    let transport = ScriptedTransport::online();
    let client = client(&transport);
    offline_with_pump(&client, &transport).await;
    let health = Events::default();
    let recorder = health.clone();
    client.set_network_health_callback(move |healthy| recorder.push(format!("healthy={healthy}")));

    client.retry_pending().await;
    client.retry_pending().await;

    assert!(client.is_healthy());
    assert_eq!(health.snapshot(), vec!["healthy=true"]);
    assert_eq!(transport.sent_count(), 0);
    client.stop_retry_pump().await.unwrap();
}

/// Validates retry pass gating for the exponential backoff scenario.
///
/// Assertions:
/// - Ensures a pass inside the backoff window sends nothing.
/// - Ensures the window doubles after each failed pass.
#[tokio::test(start_paused = true)]
async fn failed_passes_back_off_exponentially() {
    let transport = ScriptedTransport::online();
    let clock = MockClock::new();
    let settings = ClientSettings { retry_strategy: RetryStrategyKind::Exponential, ..settings() };
    let client = ResilientClient::builder(settings, transport.clone())
        .retry_strategy(Arc::new(ExponentialBackoff::new(Duration::from_secs(1), 8)))
        .clock(Arc::new(clock.clone()))
        .build()
        .unwrap();
    offline_with_pump(&client, &transport).await;
    client.submit(write("stats", "level")).await.unwrap();

    client.retry_pending().await;
    assert_eq!(transport.sent_count(), 1);

    client.retry_pending().await;
    assert_eq!(transport.sent_count(), 1, "held back inside the first 1s window");

    clock.advance(Duration::from_secs(1));
    client.retry_pending().await;
    assert_eq!(transport.sent_count(), 2);

    clock.advance(Duration::from_secs(1));
    client.retry_pending().await;
    assert_eq!(transport.sent_count(), 2, "second window is 2s");

    clock.advance(Duration::from_secs(1));
    client.retry_pending().await;
    assert_eq!(transport.sent_count(), 3);
    client.stop_retry_pump().await.unwrap();
}

/// Validates the pump-driven pass for the recovery scenario.
///
/// Assertions:
/// - Ensures the pump drains the queue on its own once online.
/// - Ensures no send happens after `stop_retry_pump` returns.
#[tokio::test(start_paused = true)]
async fn pump_drains_queue_on_tick() {
    let transport = ScriptedTransport::online();
    let client = client(&transport);
    offline_with_pump(&client, &transport).await;
    let events = Events::default();

    client.submit(tracked(write("stats", "level"), &events)).await.unwrap();
    transport.go_online();
    tokio::time::sleep(Duration::from_millis(1_300)).await;

    assert_eq!(events.snapshot(), vec!["ok:stats/level"]);
    assert!(client.is_healthy());

    client.stop_retry_pump().await.unwrap();
    assert!(!client.is_pump_running());
    transport.forget_sent();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.sent_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn gameplay_policy_retries_throttled_writes() {
    let transport = ScriptedTransport::online();
    let client = ResilientClient::builder(settings(), transport.clone())
        .policy(GameplayDataPolicy)
        .build()
        .unwrap();
    client.start_retry_pump().await.unwrap();
    transport.then(ApiResponse::new(429, Vec::new()));

    let outcome = client.submit(write("stats", "level")).await.unwrap();

    assert!(outcome.is_pending());
    assert!(client.is_healthy(), "a throttled response is still a response");
    assert_eq!(client.queue_len(), 1);

    client.retry_pending().await;
    assert_eq!(client.queue_len(), 0);
    client.stop_retry_pump().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_then_restart_pump() {
    let transport = ScriptedTransport::online();
    let client = client(&transport);

    client.start_retry_pump().await.unwrap();
    client.stop_retry_pump().await.unwrap();
    client.stop_retry_pump().await.unwrap();
    client.start_retry_pump().await.unwrap();
    assert!(client.is_pump_running());
    client.stop_retry_pump().await.unwrap();

    let err = ClientError::PumpRunning;
    assert_eq!(err.to_string(), "Retry pump is running; stop it first");
}
