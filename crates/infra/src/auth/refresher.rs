//! Token refresher driven by a [`Ticker`]
//!
//! Manages the access token lifecycle:
//! - Holds the current access and refresh tokens
//! - Refreshes ahead of expiry on a background ticker
//! - Retries a failed refresh with a quadratic pause, then gives up
//! - Stamps the latest access token onto outgoing requests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use resync_common::{TickControl, TickHandler, Ticker, TickerError};
use resync_domain::constants::AUTHORIZATION_HEADER;
use resync_domain::ApiRequest;
use tracing::{debug, error, info, warn};

use crate::errors::RefreshError;

/// How long before expiry a refresh is scheduled.
pub const REFRESH_SECONDS_BEFORE_EXPIRATION: u64 = 120;

/// Retries after the first failed refresh before the loop gives up.
pub const MAX_REFRESH_RETRY_ATTEMPTS: u32 = 5;

const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Result of a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedCredentials {
    pub access_token: String,
    pub expires_in: Duration,
}

/// Service that trades a refresh token for a new access token.
#[async_trait]
pub trait CredentialSource: Send + Sync + 'static {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedCredentials, RefreshError>;
}

/// Delay before the next refresh of a token valid for `expires_in`.
///
/// Two minutes ahead of expiry, or halfway there when the token is short
/// lived. Never less than one second.
pub fn refresh_interval(expires_in: Duration) -> Duration {
    let ahead = expires_in.saturating_sub(Duration::from_secs(REFRESH_SECONDS_BEFORE_EXPIRATION));
    ahead.max(expires_in / 2).max(MIN_REFRESH_INTERVAL)
}

#[derive(Debug, Default)]
struct SessionTokens {
    access: Option<String>,
    refresh: Option<String>,
}

struct Shared<S> {
    source: S,
    tokens: RwLock<SessionTokens>,
}

/// Keeps a session's access token fresh.
///
/// Call [`set_session_expiration`](Self::set_session_expiration) after
/// signing in; the refresher then refreshes ahead of each expiry until the
/// refresh token is cleared, a refresh fails for good, or it is stopped.
pub struct TokenRefresher<S: CredentialSource> {
    shared: Arc<Shared<S>>,
    ticker: Ticker,
    retry_pause: Duration,
}

impl<S: CredentialSource> TokenRefresher<S> {
    pub fn new(source: S) -> Self {
        Self {
            shared: Arc::new(Shared { source, tokens: RwLock::new(SessionTokens::default()) }),
            ticker: Ticker::new("token-refresh"),
            retry_pause: Duration::from_secs(1),
        }
    }

    /// Base of the quadratic pause between retries (`attempt² * pause`).
    #[must_use]
    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    pub fn set_tokens(&self, access_token: impl Into<String>, refresh_token: Option<String>) {
        let mut tokens = self.shared.tokens.write();
        tokens.access = Some(access_token.into());
        tokens.refresh = refresh_token;
    }

    /// Forget both tokens. A running loop stops at its next tick.
    pub fn clear_tokens(&self) {
        *self.shared.tokens.write() = SessionTokens::default();
    }

    pub fn access_token(&self) -> Option<String> {
        self.shared.tokens.read().access.clone()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.shared.tokens.read().refresh.is_some()
    }

    /// Closure for
    /// [`ResilientClientBuilder::authorizer`](resync_core::ResilientClientBuilder::authorizer)
    /// that sets `Authorization: Bearer <access token>` when a token is held.
    pub fn authorizer(&self) -> impl Fn(&mut ApiRequest) + Send + Sync + 'static {
        let shared = Arc::clone(&self.shared);
        move |request: &mut ApiRequest| {
            if let Some(token) = shared.tokens.read().access.as_deref() {
                request.set_header(AUTHORIZATION_HEADER, format!("Bearer {token}"));
            }
        }
    }

    /// (Re)start the refresh loop for a token valid for `expires_in`.
    ///
    /// Without a refresh token nothing is scheduled.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::Ticker`] if the previous loop could not be
    /// joined.
    pub async fn set_session_expiration(&mut self, expires_in: Duration) -> Result<(), RefreshError> {
        self.stop().await?;

        if !self.has_refresh_token() {
            debug!("No refresh token present, token refresh not scheduled");
            return Ok(());
        }

        let interval = refresh_interval(expires_in);
        info!(next_refresh_secs = interval.as_secs(), "Scheduling token refresh");
        let handler = RefreshTick { shared: Arc::clone(&self.shared), retry_pause: self.retry_pause };
        self.ticker.start(interval, handler)?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_running()
    }

    /// Delay the loop will wait before its next refresh.
    pub fn next_refresh_in(&self) -> Duration {
        self.ticker.interval()
    }

    /// Stop the refresh loop. Stopping a stopped refresher is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::Ticker`] if the loop task panicked.
    pub async fn stop(&mut self) -> Result<(), RefreshError> {
        match self.ticker.stop().await {
            Ok(()) | Err(TickerError::NotRunning(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

struct RefreshTick<S> {
    shared: Arc<Shared<S>>,
    retry_pause: Duration,
}

impl<S: CredentialSource> RefreshTick<S> {
    async fn refresh_with_retries(&self, refresh_token: &str) -> Result<RefreshedCredentials, RefreshError> {
        let mut attempt = 0;
        loop {
            match self.shared.source.refresh(refresh_token).await {
                Ok(credentials) => return Ok(credentials),
                Err(e) if attempt >= MAX_REFRESH_RETRY_ATTEMPTS => return Err(e),
                Err(e) => {
                    attempt += 1;
                    error!("Token refresh failed: {e}");
                    info!("Retry attempt {attempt}/{MAX_REFRESH_RETRY_ATTEMPTS}");
                    tokio::time::sleep(self.retry_pause * attempt * attempt).await;
                }
            }
        }
    }
}

#[async_trait]
impl<S: CredentialSource> TickHandler for RefreshTick<S> {
    async fn tick(&mut self, control: &mut TickControl) {
        let refresh_token = self.shared.tokens.read().refresh.clone();
        let Some(refresh_token) = refresh_token else {
            info!("No refresh token present, stopping token refresh loop");
            control.abort();
            return;
        };

        match self.refresh_with_retries(&refresh_token).await {
            Ok(credentials) => {
                let mut tokens = self.shared.tokens.write();
                // Signed out while the refresh was in flight.
                if tokens.refresh.is_none() {
                    drop(tokens);
                    control.abort();
                    return;
                }
                tokens.access = Some(credentials.access_token);
                drop(tokens);

                let interval = refresh_interval(credentials.expires_in);
                info!(next_refresh_secs = interval.as_secs(), "Token refreshed");
                control.reschedule(interval);
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, will no longer retry");
                control.abort();
            }
        }
    }
}
