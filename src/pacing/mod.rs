//! Pacing engine: decides when each record of a cycle becomes due
//!
//! Every due time is computed from two anchors taken at the first record of
//! a cycle (the clock instant and the record's timestamp), so a late publish
//! never shifts the records after it.

mod clock;
mod engine;

use std::time::Duration;

use chrono::TimeDelta;

use crate::{CadenceError, Result};

pub use clock::{Clock, ManualClock, TokioClock};
pub use engine::{schedule, Pacer, Step};

/// Upper bound on a single schedule offset (~30 years)
pub const MAX_SCHEDULE_OFFSET: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Replay speed multiplier
///
/// A factor of 10 replays ten times faster than the capture, 0.5 twice as slow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedFactor(f64);

impl SpeedFactor {
    /// Real-time replay
    pub const REAL_TIME: Self = Self(1.0);

    /// Create a speed factor
    ///
    /// # Errors
    ///
    /// Returns a configuration error unless `factor` is finite and > 0
    pub fn new(factor: f64) -> Result<Self> {
        if factor.is_finite() && factor > 0.0 {
            Ok(Self(factor))
        } else {
            Err(CadenceError::Config(format!(
                "speed factor must be a positive number, got {factor}"
            )))
        }
    }

    /// Raw multiplier
    pub fn get(self) -> f64 {
        self.0
    }

    /// Wall-clock duration for a data-time delta.
    ///
    /// Negative deltas map to zero.
    pub fn scale(self, delta: TimeDelta) -> Duration {
        let Ok(delta) = delta.to_std() else {
            return Duration::ZERO;
        };

        Duration::try_from_secs_f64(delta.as_secs_f64() / self.0)
            .map_or(MAX_SCHEDULE_OFFSET, |scaled| scaled.min(MAX_SCHEDULE_OFFSET))
    }
}

impl Default for SpeedFactor {
    fn default() -> Self {
        Self::REAL_TIME
    }
}

impl std::fmt::Display for SpeedFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x", self.0)
    }
}
