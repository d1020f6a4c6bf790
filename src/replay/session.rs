//! Replay session state and counters

use std::time::Duration;

use crate::config::ReplayConfig;
use crate::pacing::SpeedFactor;
use crate::{CadenceError, Result};

/// Per-process replay state: pacing settings plus the cycle counter
#[derive(Debug, Clone)]
pub struct ReplaySession {
    speed: SpeedFactor,
    loop_forever: bool,
    max_cycles: Option<u64>,
    progress_every: u64,
    cycle_count: u64,
}

impl ReplaySession {
    /// Single-cycle session at the given speed
    pub fn new(speed: SpeedFactor) -> Self {
        Self {
            speed,
            loop_forever: false,
            max_cycles: None,
            progress_every: 1000,
            cycle_count: 0,
        }
    }

    /// Build a session from replay configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a non-positive speed or zero limits
    pub fn from_config(config: &ReplayConfig) -> Result<Self> {
        if config.progress_every == 0 {
            return Err(CadenceError::Config(
                "progress_every must be > 0".to_string(),
            ));
        }

        Ok(Self::new(SpeedFactor::new(config.speed)?)
            .with_loop(config.loop_forever)
            .with_max_cycles(config.max_cycles)
            .with_progress_every(config.progress_every))
    }

    /// Enable or disable looping
    #[must_use]
    pub fn with_loop(mut self, loop_forever: bool) -> Self {
        self.loop_forever = loop_forever;
        self
    }

    /// Bound the number of cycles when looping
    #[must_use]
    pub fn with_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
        self.max_cycles = max_cycles.filter(|n| *n > 0);
        self
    }

    /// Progress reporting interval in records
    #[must_use]
    pub fn with_progress_every(mut self, every: u64) -> Self {
        self.progress_every = every.max(1);
        self
    }

    /// Speed factor
    pub fn speed(&self) -> SpeedFactor {
        self.speed
    }

    /// Whether the session loops
    pub fn is_looping(&self) -> bool {
        self.loop_forever
    }

    /// Cycles started so far
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Progress reporting interval
    pub fn progress_every(&self) -> u64 {
        self.progress_every
    }

    /// Start a new cycle and return its 1-based number
    pub(crate) fn begin_cycle(&mut self) -> u64 {
        self.cycle_count += 1;
        self.cycle_count
    }

    /// Whether another cycle should follow the one just finished
    pub(crate) fn wants_another_cycle(&self) -> bool {
        self.loop_forever && self.max_cycles.map_or(true, |max| self.cycle_count < max)
    }
}

/// Publish counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records handed to the publisher successfully
    pub published: u64,
    /// Records whose publish failed
    pub failed: u64,
}

impl ReplayStats {
    /// Publish attempts
    pub fn attempted(&self) -> u64 {
        self.published + self.failed
    }

    pub(crate) fn absorb(&mut self, other: Self) {
        self.published += other.published;
        self.failed += other.failed;
    }
}

/// Final report of a replay run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Cycles started (a cancelled cycle counts)
    pub cycles: u64,
    /// Totals across all cycles
    pub stats: ReplayStats,
    /// Whether the run stopped on cancellation
    pub cancelled: bool,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl std::fmt::Display for ReplaySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} published, {} failed over {} cycle(s) in {:.1}s{}",
            self.stats.published,
            self.stats.failed,
            self.cycles,
            self.elapsed.as_secs_f64(),
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }
}
