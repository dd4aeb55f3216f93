use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Source of "now" and of suspension.
///
/// Production code uses [`TokioClock`]; tests use [`ManualClock`] (or a paused
/// tokio runtime) so staggered schedules can be checked without real sleeps.
#[async_trait]
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock for timestamps, tokio timers for suspension.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock that advances instantly when slept on.
///
/// Every sleep is recorded so callers can assert on the exact pauses a
/// component asked for.
#[derive(Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualClockState>>,
}

struct ManualClockState {
    now: DateTime<Utc>,
    sleeps: Vec<Duration>,
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("ManualClock")
            .field("now", &state.now)
            .field("sleep_count", &state.sleeps.len())
            .finish()
    }
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualClockState {
                now: start,
                sleeps: Vec::new(),
            })),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut state = self.inner.lock();
        state.now += to_chrono(duration);
    }

    /// Total virtual time spent sleeping so far.
    pub fn elapsed_sleeping(&self) -> Duration {
        self.inner.lock().sleeps.iter().sum()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().sleeps.clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.inner.lock().now
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut state = self.inner.lock();
            state.now += to_chrono(duration);
            state.sleeps.push(duration);
        }
        // Keep sleep a real suspension point so other tasks get to run.
        tokio::task::yield_now().await;
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
