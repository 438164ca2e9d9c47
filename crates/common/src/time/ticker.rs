//! Restartable interval scheduler.
//!
//! A [`Ticker`] owns one background tokio task per start/stop cycle. The task
//! wakes every [`PULSE`], counts down the configured interval, and runs the
//! [`TickHandler`] once the interval has elapsed. The pulse is independent of
//! the interval, so a stop request or a reschedule takes effect within one
//! pulse regardless of how long the interval is.
//!
//! Loop control is only reachable through the [`TickControl`] handed to the
//! handler for the duration of a tick. Code outside the tick cannot abort or
//! reschedule the loop because it never holds a `TickControl`.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use resync_common::time::{from_fn, Ticker};
//!
//! # async fn example() -> Result<(), resync_common::time::TickerError> {
//! let mut ticker = Ticker::new("heartbeat");
//! let mut beats = 0;
//! ticker.start(
//!     Duration::from_secs(2),
//!     from_fn(move |control| {
//!         beats += 1;
//!         if beats == 3 {
//!             control.abort();
//!         }
//!     }),
//! )?;
//! // ... application runs ...
//! ticker.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{TickerError, TickerResult};

/// Wake granularity of every ticker loop.
pub const PULSE: Duration = Duration::from_millis(250);

/// How the loop decides that an interval has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountdownMode {
    /// Subtract one pulse per wake; fire when nothing remains. Time spent
    /// inside a tick does not count against the next interval.
    #[default]
    Count,
    /// Fire once the monotonic clock passes a deadline set when the previous
    /// cycle ended.
    Deadline,
}

/// Capability handed to a [`TickHandler`] for the duration of one tick.
#[derive(Debug)]
pub struct TickControl {
    interval: Duration,
    abort: bool,
    reschedule: Option<Duration>,
}

impl TickControl {
    fn new(interval: Duration) -> Self {
        Self { interval, abort: false, reschedule: None }
    }

    /// Exit the loop once this tick returns.
    pub fn abort(&mut self) {
        self.abort = true;
    }

    /// Use `interval` from the next cycle on.
    pub fn reschedule(&mut self, interval: Duration) {
        self.reschedule = Some(interval);
    }

    /// Interval in effect for the current cycle.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether [`abort`](Self::abort) was requested during this tick.
    pub fn is_aborted(&self) -> bool {
        self.abort
    }
}

/// Work run by a [`Ticker`] each time its interval elapses.
///
/// Ticks never overlap: the loop awaits `tick` before counting down again.
#[async_trait]
pub trait TickHandler: Send + 'static {
    /// Run one tick.
    async fn tick(&mut self, control: &mut TickControl);
}

/// [`TickHandler`] backed by a synchronous closure. Built with [`from_fn`].
pub struct FnHandler<F>(F);

/// Wrap a synchronous closure as a [`TickHandler`].
pub fn from_fn<F>(f: F) -> FnHandler<F>
where
    F: FnMut(&mut TickControl) + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F> TickHandler for FnHandler<F>
where
    F: FnMut(&mut TickControl) + Send + 'static,
{
    async fn tick(&mut self, control: &mut TickControl) {
        (self.0)(control);
    }
}

/// Cheap, cloneable view of whether a ticker loop is alive.
#[derive(Debug, Clone, Default)]
pub struct TickerStatus(Arc<AtomicBool>);

impl TickerStatus {
    /// `true` from `start` until the loop exits (stop or abort).
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, running: bool) {
        self.0.store(running, Ordering::Release);
    }
}

struct RunningLoop {
    handle: JoinHandle<()>,
    done: oneshot::Receiver<()>,
}

/// Interval scheduler with a fixed wake pulse.
pub struct Ticker {
    name: String,
    mode: CountdownMode,
    interval: Arc<Mutex<Duration>>,
    status: TickerStatus,
    cancellation_token: CancellationToken,
    task: Option<RunningLoop>,
}

impl Ticker {
    /// Create a stopped ticker using [`CountdownMode::Count`].
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_mode(name, CountdownMode::Count)
    }

    /// Create a stopped ticker with an explicit countdown mode.
    pub fn with_mode(name: impl Into<String>, mode: CountdownMode) -> Self {
        Self {
            name: name.into(),
            mode,
            interval: Arc::new(Mutex::new(Duration::ZERO)),
            status: TickerStatus::default(),
            cancellation_token: CancellationToken::new(),
            task: None,
        }
    }

    /// Name used in log records.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interval that the next cycle will use.
    pub fn interval(&self) -> Duration {
        *self.interval.lock()
    }

    /// Whether the loop is alive.
    ///
    /// Goes `false` as soon as the loop exits, including after a handler
    /// aborts it, not only once [`stop`](Self::stop) completes. An aborted
    /// ticker reports not running and can be started again right away.
    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// Shareable running flag for callers that must not borrow the ticker.
    pub fn status(&self) -> TickerStatus {
        self.status.clone()
    }

    /// Spawn the loop on the current tokio runtime.
    ///
    /// A ticker whose previous loop was stopped or aborted can be started
    /// again.
    ///
    /// # Errors
    ///
    /// Returns [`TickerError::AlreadyRunning`] if the loop is alive.
    pub fn start<H: TickHandler>(&mut self, interval: Duration, handler: H) -> TickerResult<()> {
        if self.is_running() {
            return Err(TickerError::AlreadyRunning(self.name.clone()));
        }

        // Reap a loop that exited through abort.
        if let Some(previous) = self.task.take() {
            previous.handle.abort();
        }

        info!(ticker = %self.name, interval_ms = interval.as_millis() as u64, "Starting ticker");

        *self.interval.lock() = interval;
        self.cancellation_token = CancellationToken::new();
        self.status.set(true);

        let (done_tx, done_rx) = oneshot::channel();
        let state = LoopState {
            name: self.name.clone(),
            mode: self.mode,
            interval: Arc::clone(&self.interval),
            status: self.status.clone(),
            cancel: self.cancellation_token.clone(),
        };

        let handle = tokio::spawn(run_loop(state, handler, done_tx));
        self.task = Some(RunningLoop { handle, done: done_rx });

        Ok(())
    }

    /// Stop the loop and wait until it has fully exited.
    ///
    /// A tick in progress runs to completion first. No tick fires after this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns [`TickerError::NotRunning`] if the ticker was never started or
    /// has already been stopped, and [`TickerError::JoinFailed`] if the loop
    /// task panicked.
    pub async fn stop(&mut self) -> TickerResult<()> {
        let Some(running) = self.task.take() else {
            return Err(TickerError::NotRunning(self.name.clone()));
        };

        info!(ticker = %self.name, "Stopping ticker");
        self.cancellation_token.cancel();

        // A dropped sender means the loop panicked; the join below reports it.
        if running.done.await.is_err() {
            debug!(ticker = %self.name, "Ticker exited without completion signal");
        }
        let joined = running.handle.await;
        self.status.set(false);
        joined.map_err(|e| TickerError::JoinFailed(e.to_string()))?;

        info!(ticker = %self.name, "Ticker stopped");
        Ok(())
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!(ticker = %self.name, "Ticker dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}

struct LoopState {
    name: String,
    mode: CountdownMode,
    interval: Arc<Mutex<Duration>>,
    status: TickerStatus,
    cancel: CancellationToken,
}

enum Countdown {
    Count { remaining: Duration },
    Deadline { at: Instant },
}

impl Countdown {
    fn new(mode: CountdownMode, interval: Duration) -> Self {
        match mode {
            CountdownMode::Count => Self::Count { remaining: interval },
            CountdownMode::Deadline => Self::Deadline { at: Instant::now() + interval },
        }
    }

    /// Account for one pulse; `true` when the interval has elapsed.
    fn elapse(&mut self, pulse: Duration) -> bool {
        match self {
            Self::Count { remaining } => {
                *remaining = remaining.saturating_sub(pulse);
                remaining.is_zero()
            }
            Self::Deadline { at } => Instant::now() >= *at,
        }
    }
}

async fn run_loop<H: TickHandler>(state: LoopState, mut handler: H, done: oneshot::Sender<()>) {
    let LoopState { name, mode, interval, status, cancel } = state;
    let mut countdown = Countdown::new(mode, *interval.lock());

    loop {
        // Only the sleep races the cancellation; a tick is never interrupted.
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(ticker = %name, "Ticker loop cancelled");
                break;
            }
            () = tokio::time::sleep(PULSE) => {}
        }

        if !countdown.elapse(PULSE) {
            continue;
        }

        let current = *interval.lock();
        let mut control = TickControl::new(current);
        handler.tick(&mut control).await;

        if let Some(next) = control.reschedule {
            info!(ticker = %name, interval_ms = next.as_millis() as u64, "Ticker rescheduled");
            *interval.lock() = next;
        }

        if control.abort {
            info!(ticker = %name, "Ticker loop aborted from tick");
            break;
        }

        countdown = Countdown::new(mode, *interval.lock());
    }

    status.set(false);
    let _ = done.send(());
}
