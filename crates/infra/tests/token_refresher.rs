//! Token refresher scheduling, retry and shutdown behaviour on paused time.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use resync_infra::auth::refresh_interval;
use resync_infra::{CredentialSource, RefreshError, RefreshedCredentials, TokenRefresher};

/// Answers from a script first, then with a fresh hour-long token.
#[derive(Clone, Default)]
struct ScriptedSource {
    script: Arc<Mutex<VecDeque<Result<RefreshedCredentials, RefreshError>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSource {
    fn fail_times(&self, n: usize) {
        let mut script = self.script.lock();
        for _ in 0..n {
            script.push_back(Err(RefreshError::Unreachable("connection refused".into())));
        }
    }

    fn then_expiring_in(&self, expires_in: Duration) {
        let n = self.script.lock().len() + 1;
        self.script.lock().push_back(Ok(RefreshedCredentials {
            access_token: format!("scripted-{n}"),
            expires_in,
        }));
    }

    fn calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl CredentialSource for ScriptedSource {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedCredentials, RefreshError> {
        let call = {
            let mut calls = self.calls.lock();
            calls.push(refresh_token.to_string());
            calls.len()
        };
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(RefreshedCredentials {
                access_token: format!("fresh-{call}"),
                expires_in: Duration::from_secs(3600),
            })
        })
    }
}

fn signed_in(source: &ScriptedSource) -> TokenRefresher<ScriptedSource> {
    let refresher = TokenRefresher::new(source.clone());
    refresher.set_tokens("initial", Some("refresh-token".to_string()));
    refresher
}

/// Validates `TokenRefresher` behavior for the scheduled refresh scenario.
///
/// Assertions:
/// - Ensures nothing is refreshed before the computed interval.
/// - Ensures the refresh stores the new access token.
/// - Ensures the loop reschedules from the new expiry.
#[tokio::test(start_paused = true)]
async fn refreshes_ahead_of_expiry_and_reschedules() {
    let source = ScriptedSource::default();
    let mut refresher = signed_in(&source);

    refresher.set_session_expiration(Duration::from_secs(240)).await.unwrap();
    assert!(refresher.is_running());
    assert_eq!(refresher.next_refresh_in(), Duration::from_secs(120));

    tokio::time::sleep(Duration::from_secs(119)).await;
    assert_eq!(source.calls(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(refresher.access_token().as_deref(), Some("fresh-1"));
    assert_eq!(refresher.next_refresh_in(), refresh_interval(Duration::from_secs(3600)));
    assert_eq!(source.calls.lock()[0], "refresh-token");

    refresher.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn nothing_is_scheduled_without_refresh_token() {
    let source = ScriptedSource::default();
    let mut refresher = TokenRefresher::new(source.clone());
    refresher.set_tokens("initial", None);

    refresher.set_session_expiration(Duration::from_secs(10)).await.unwrap();

    assert!(!refresher.is_running());
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(source.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn cleared_tokens_abort_the_loop_at_next_tick() {
    let source = ScriptedSource::default();
    let mut refresher = signed_in(&source);
    refresher.set_session_expiration(Duration::from_secs(10)).await.unwrap();

    refresher.clear_tokens();
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(!refresher.is_running());
    assert_eq!(source.calls(), 0);
    refresher.stop().await.unwrap();
}

/// Validates `TokenRefresher` behavior for the transient failure scenario.
///
/// Assertions:
/// - Ensures failures are retried after 1s then 4s.
/// - Ensures the eventual success is stored and rescheduled.
#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_quadratically() {
    let source = ScriptedSource::default();
    source.fail_times(2);
    source.then_expiring_in(Duration::from_secs(600));
    let mut refresher = signed_in(&source);
    refresher.set_session_expiration(Duration::from_secs(10)).await.unwrap();

    // First tick at 5s, retries at 6s and 10s.
    tokio::time::sleep(Duration::from_millis(9_500)).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(refresher.access_token().as_deref(), Some("initial"));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(source.calls(), 3);
    assert_eq!(refresher.access_token().as_deref(), Some("scripted-3"));
    assert_eq!(refresher.next_refresh_in(), Duration::from_secs(480));
    assert!(refresher.is_running());

    refresher.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn loop_gives_up_after_retries_are_exhausted() {
    let source = ScriptedSource::default();
    source.fail_times(10);
    let mut refresher = signed_in(&source);
    refresher.set_session_expiration(Duration::from_secs(10)).await.unwrap();

    // 5s to the tick, then 1 + 4 + 9 + 16 + 25 seconds of pauses.
    tokio::time::sleep(Duration::from_secs(70)).await;

    assert_eq!(source.calls(), 6);
    assert!(!refresher.is_running());
    assert_eq!(refresher.access_token().as_deref(), Some("initial"));
    refresher.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_prevents_further_refreshes() {
    let source = ScriptedSource::default();
    let mut refresher = signed_in(&source);
    refresher.set_session_expiration(Duration::from_secs(10)).await.unwrap();

    refresher.stop().await.unwrap();
    refresher.stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(!refresher.is_running());
    assert_eq!(source.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn new_expiration_restarts_the_loop() {
    let source = ScriptedSource::default();
    let mut refresher = signed_in(&source);
    refresher.set_session_expiration(Duration::from_secs(3600)).await.unwrap();

    refresher.set_session_expiration(Duration::from_secs(4)).await.unwrap();
    assert_eq!(refresher.next_refresh_in(), Duration::from_secs(2));

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    assert_eq!(source.calls(), 1);
    refresher.stop().await.unwrap();
}
