//! Replay controller: drives cycles through the pacer into a publisher

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::pacing::{schedule, Clock, Pacer, Step, TokioClock};
use crate::publish::Publisher;
use crate::record::Record;

use super::session::{ReplaySession, ReplayStats, ReplaySummary};

/// How a single cycle ended
enum CycleEnd {
    Completed,
    Cancelled,
}

/// Orchestrates replay cycles for one session
pub struct ReplayController {
    session: ReplaySession,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
    totals: ReplayStats,
}

impl ReplayController {
    /// Controller pacing against the tokio timer
    pub fn new(session: ReplaySession, publisher: Arc<dyn Publisher>) -> Self {
        Self::with_clock(session, publisher, Arc::new(TokioClock))
    }

    /// Controller with an explicit clock
    pub fn with_clock(
        session: ReplaySession,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            session,
            publisher,
            clock,
            totals: ReplayStats::default(),
        }
    }

    /// Session state
    pub fn session(&self) -> &ReplaySession {
        &self.session
    }

    /// Running totals
    pub fn stats(&self) -> ReplayStats {
        self.totals
    }

    /// Replay `records` until the last cycle ends or `cancel` fires.
    ///
    /// Publish failures are counted and skipped; they never end the run.
    /// Cancellation is honoured before each pacing wait, during it, and
    /// between cycles. A publish already in progress is left to finish.
    pub async fn run(&mut self, records: &[Record], cancel: &CancellationToken) -> ReplaySummary {
        let clock = Arc::clone(&self.clock);
        let started = clock.now();
        let speed = self.session.speed();

        if records.is_empty() {
            warn!("No records to replay");
        } else if let Some(span) = schedule(records, speed).last() {
            info!(
                records = records.len(),
                speed = %speed,
                cycle_secs = span.as_secs_f64(),
                looping = self.session.is_looping(),
                "Starting replay"
            );
        }

        let mut pacer = Pacer::new(records, speed, &*clock);
        let mut cancelled = false;

        loop {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let cycle = self.session.begin_cycle();
            debug!(cycle, "Cycle started");

            let (end, stats) = self.run_cycle(&mut pacer, cancel).await;
            self.totals.absorb(stats);

            if let CycleEnd::Cancelled = end {
                info!(
                    cycle,
                    published = stats.published,
                    failed = stats.failed,
                    "Cycle cancelled"
                );
                cancelled = true;
                break;
            }

            info!(
                cycle,
                published = stats.published,
                failed = stats.failed,
                "Cycle complete"
            );

            // An empty source would otherwise spin forever in loop mode
            if records.is_empty() || !self.session.wants_another_cycle() {
                break;
            }
            pacer.restart();
        }

        ReplaySummary {
            cycles: self.session.cycle_count(),
            stats: self.totals,
            cancelled,
            elapsed: clock.now().saturating_duration_since(started),
        }
    }

    async fn run_cycle<C: Clock + ?Sized>(
        &mut self,
        pacer: &mut Pacer<'_, C>,
        cancel: &CancellationToken,
    ) -> (CycleEnd, ReplayStats) {
        let mut stats = ReplayStats::default();

        loop {
            let record = match pacer.next(cancel).await {
                Step::Due(record) => record,
                Step::EndOfCycle => return (CycleEnd::Completed, stats),
                Step::Cancelled => return (CycleEnd::Cancelled, stats),
            };

            match self.publisher.publish(record).await {
                Ok(()) => {
                    stats.published += 1;
                    debug!(topic = %record.topic, bytes = record.payload.len(), "Published");
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(topic = %record.topic, error = %e, "Publish failed, skipping record");
                }
            }

            let attempted = self.totals.attempted() + stats.attempted();
            if attempted % self.session.progress_every() == 0 {
                info!(
                    published = self.totals.published + stats.published,
                    failed = self.totals.failed + stats.failed,
                    position = pacer.position(),
                    of = pacer.len(),
                    "Replay progress"
                );
            }
        }
    }
}
