//! Clock abstraction used by the pacer

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Source of "now" and a way to wait for a future instant
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Suspend until `deadline`; returns at once if it has passed
    async fn sleep_until(&self, deadline: Instant);
}

/// Clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
    }
}

/// Clock that only moves when slept on or advanced by hand.
///
/// Sleeping jumps straight to the deadline, which makes schedules exact
/// and instantaneous in tests.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    /// Create a clock whose origin is the current tokio instant
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    /// Time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        *self.lock()
    }

    /// Move the clock forward, e.g. to simulate a slow publish
    pub fn advance(&self, by: Duration) {
        *self.lock() += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Duration> {
        // A poisoned guard still holds a valid Duration
        self.elapsed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    async fn sleep_until(&self, deadline: Instant) {
        let target = deadline.saturating_duration_since(self.base);
        let mut elapsed = self.lock();
        if target > *elapsed {
            *elapsed = target;
        }
    }
}
