//! Local clocks for deterministic tests.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::clock::LocalClock;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A local clock that only moves when told to.
///
/// `sleep` advances the clock by the requested duration instead of waiting,
/// so synchronized sleeps complete instantly and their length can be read
/// back from [`ManualClock::slept`].
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
    slept: Mutex<Duration>,
}

impl ManualClock {
    /// Create a clock reading `start`
    #[must_use]
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
            slept: Mutex::new(Duration::ZERO),
        }
    }

    /// Move forward
    pub fn advance(&self, by: Duration) {
        *lock(&self.now) += by;
    }

    /// Move backward
    pub fn rewind(&self, by: Duration) {
        *lock(&self.now) -= by;
    }

    /// Jump to `time`
    pub fn set(&self, time: SystemTime) {
        *lock(&self.now) = time;
    }

    /// Total time passed to `sleep`
    #[must_use]
    pub fn slept(&self) -> Duration {
        *lock(&self.slept)
    }
}

#[async_trait]
impl LocalClock for ManualClock {
    fn now(&self) -> SystemTime {
        *lock(&self.now)
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        *lock(&self.slept) += duration;
        tokio::task::yield_now().await;
    }
}

/// A local clock driven by the tokio timer.
///
/// Readings are `base` plus the tokio time elapsed since creation, so a
/// runtime with paused time controls the wall clock as well.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base: SystemTime,
    started: tokio::time::Instant,
}

impl TokioClock {
    /// Create a clock reading `base` now
    #[must_use]
    pub fn new(base: SystemTime) -> Self {
        Self {
            base,
            started: tokio::time::Instant::now(),
        }
    }
}

#[async_trait]
impl LocalClock for TokioClock {
    fn now(&self) -> SystemTime {
        self.base + self.started.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
