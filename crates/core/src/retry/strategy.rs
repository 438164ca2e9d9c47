//! Backoff strategies gating retry passes

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use resync_domain::{ClientSettings, RetryStrategyKind};

/// Maps the number of consecutive failed passes to the wait before the next
/// pass may run.
pub trait RetryStrategy: Send + Sync + fmt::Debug {
    fn delay(&self, attempts: u32) -> Duration;
}

/// Randomisation applied on top of the computed delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// Exact delays
    #[default]
    None,
    /// Uniform in `[delay / 2, delay]`
    Equal,
}

impl Jitter {
    fn apply(self, delay: Duration) -> Duration {
        match self {
            Jitter::None => delay,
            Jitter::Equal => {
                let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                let half = millis / 2;
                if half == 0 {
                    return delay;
                }
                let jittered = half + rand::thread_rng().gen_range(0..=half);
                Duration::from_millis(jittered)
            }
        }
    }
}

/// `base * 2^min(attempts, max_exponent)`, saturating at `u64::MAX` ms.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max_exponent: u32,
    jitter: Jitter,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max_exponent: u32) -> Self {
        Self { base, max_exponent, jitter: Jitter::None }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max_exponent(&self) -> u32 {
        self.max_exponent
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn delay(&self, attempts: u32) -> Duration {
        let base_millis = u64::try_from(self.base.as_millis()).unwrap_or(u64::MAX);
        let exponent = attempts.min(self.max_exponent);
        let millis = base_millis.saturating_mul(2_u64.saturating_pow(exponent));
        self.jitter.apply(Duration::from_millis(millis))
    }
}

/// Same delay after every failure; the default of zero retries on every
/// tick.
#[derive(Debug, Clone, Default)]
pub struct ConstantInterval {
    delay: Duration,
}

impl ConstantInterval {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl RetryStrategy for ConstantInterval {
    fn delay(&self, _attempts: u32) -> Duration {
        self.delay
    }
}

/// Build the strategy named by `settings.retry_strategy`.
pub fn from_settings(settings: &ClientSettings) -> Arc<dyn RetryStrategy> {
    match settings.retry_strategy {
        RetryStrategyKind::Exponential => {
            Arc::new(ExponentialBackoff::new(settings.backoff_base(), settings.backoff_max_exponent))
        }
        RetryStrategyKind::Constant => Arc::new(ConstantInterval::default()),
    }
}
