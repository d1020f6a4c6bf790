//! Per-cycle pacing of an ordered record sequence

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{Clock, SpeedFactor};
use crate::record::Record;

/// Outcome of one pacing step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'a> {
    /// The record is due now
    Due(&'a Record),
    /// Every record of the cycle has been yielded
    EndOfCycle,
    /// Cancellation was requested before or during the wait
    Cancelled,
}

/// Anchors taken when the first record of a cycle is yielded
#[derive(Debug, Clone, Copy)]
struct Origins {
    cycle: Instant,
    data: DateTime<Utc>,
}

/// Lazily yields records at their scheduled instants
pub struct Pacer<'a, C: Clock + ?Sized> {
    records: &'a [Record],
    speed: SpeedFactor,
    clock: &'a C,
    cursor: usize,
    origins: Option<Origins>,
}

impl<'a, C: Clock + ?Sized> Pacer<'a, C> {
    /// Create a pacer over `records`, positioned at the start of a cycle
    pub fn new(records: &'a [Record], speed: SpeedFactor, clock: &'a C) -> Self {
        Self {
            records,
            speed,
            clock,
            cursor: 0,
            origins: None,
        }
    }

    /// Rewind to the first record; origins are re-taken on the next step
    pub fn restart(&mut self) {
        self.cursor = 0;
        self.origins = None;
    }

    /// Number of records already yielded in this cycle
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Records per cycle
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether a cycle has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Wait for the next record to become due and yield it.
    ///
    /// The first record of a cycle is yielded immediately and fixes the
    /// cycle's origins. Every later record is due at
    /// `cycle_origin + (timestamp - data_origin) / speed`; a target already
    /// in the past is yielded without waiting.
    pub async fn next(&mut self, cancel: &CancellationToken) -> Step<'a> {
        let records = self.records;
        let Some(record) = records.get(self.cursor) else {
            return Step::EndOfCycle;
        };

        if cancel.is_cancelled() {
            return Step::Cancelled;
        }

        match self.origins {
            None => {
                self.origins = Some(Origins {
                    cycle: self.clock.now(),
                    data: record.timestamp,
                });
            }
            Some(origins) => {
                let target = origins.cycle + self.speed.scale(record.timestamp - origins.data);
                if target > self.clock.now() {
                    trace!(index = self.cursor, "Waiting for record to become due");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Step::Cancelled,
                        () = self.clock.sleep_until(target) => {}
                    }
                }
            }
        }

        self.cursor += 1;
        Step::Due(record)
    }
}

/// Offsets of every record from the start of a cycle at the given speed
pub fn schedule(records: &[Record], speed: SpeedFactor) -> Vec<Duration> {
    let Some(first) = records.first() else {
        return Vec::new();
    };

    records
        .iter()
        .map(|record| speed.scale(record.timestamp - first.timestamp))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::{ManualClock, TokioClock};
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn records_at(offsets_ms: &[i64]) -> Vec<Record> {
        let base = Utc.with_ymd_and_hms(2025, 9, 17, 0, 0, 0).unwrap();
        offsets_ms
            .iter()
            .enumerate()
            .map(|(i, ms)| {
                Record::new(
                    base + chrono::TimeDelta::milliseconds(*ms),
                    "test/topic",
                    format!("r{i}"),
                )
            })
            .collect()
    }

    async fn due_offsets(records: &[Record], speed: f64) -> Vec<Duration> {
        let clock = ManualClock::new();
        let cancel = CancellationToken::new();
        let mut pacer = Pacer::new(records, SpeedFactor::new(speed).unwrap(), &clock);

        let mut offsets = Vec::new();
        while let Step::Due(_) = pacer.next(&cancel).await {
            offsets.push(clock.elapsed());
        }
        offsets
    }

    #[tokio::test]
    async fn test_real_time_schedule() {
        let records = records_at(&[0, 1000, 3000]);
        let offsets = due_offsets(&records, 1.0).await;
        assert_eq!(
            offsets,
            vec![Duration::ZERO, Duration::from_secs(1), Duration::from_secs(3)]
        );
    }

    #[tokio::test]
    async fn test_accelerated_and_slowed_schedule() {
        let records = records_at(&[0, 1000, 3000]);

        let fast = due_offsets(&records, 10.0).await;
        assert_eq!(fast[1], Duration::from_millis(100));
        assert_eq!(fast[2], Duration::from_millis(300));

        let slow = due_offsets(&records, 0.5).await;
        assert_eq!(slow[1], Duration::from_secs(2));
        assert_eq!(slow[2], Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_out_of_order_timestamps_do_not_wait() {
        let records = records_at(&[0, 2000, 1000, 1000, -500]);
        let offsets = due_offsets(&records, 1.0).await;

        // Earlier timestamps are yielded at once, in source order
        assert_eq!(offsets.len(), 5);
        assert_eq!(offsets[1], Duration::from_secs(2));
        assert!(offsets[2..].iter().all(|o| *o == Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn test_yields_in_source_order() {
        let records = records_at(&[0, 500, 500, 100, 900]);
        let clock = ManualClock::new();
        let cancel = CancellationToken::new();
        let mut pacer = Pacer::new(&records, SpeedFactor::REAL_TIME, &clock);

        let mut seen = Vec::new();
        while let Step::Due(record) = pacer.next(&cancel).await {
            seen.push(record.payload_str().into_owned());
        }
        assert_eq!(seen, vec!["r0", "r1", "r2", "r3", "r4"]);
    }

    #[tokio::test]
    async fn test_late_record_does_not_shift_schedule() {
        let records = records_at(&[0, 1000, 2000, 3000]);
        let clock = ManualClock::new();
        let cancel = CancellationToken::new();
        let mut pacer = Pacer::new(&records, SpeedFactor::REAL_TIME, &clock);

        assert!(matches!(pacer.next(&cancel).await, Step::Due(_)));
        assert!(matches!(pacer.next(&cancel).await, Step::Due(_)));

        // Publishing record 1 took 1.5s, so record 2 is already late
        clock.advance(Duration::from_millis(1500));
        assert!(matches!(pacer.next(&cancel).await, Step::Due(_)));
        assert_eq!(clock.elapsed(), Duration::from_millis(2500));

        // Record 3 is still due at its absolute offset
        assert!(matches!(pacer.next(&cancel).await, Step::Due(_)));
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_restart_resets_origins() {
        let records = records_at(&[0, 1000]);
        let clock = ManualClock::new();
        let cancel = CancellationToken::new();
        let mut pacer = Pacer::new(&records, SpeedFactor::REAL_TIME, &clock);

        while let Step::Due(_) = pacer.next(&cancel).await {}
        assert_eq!(pacer.position(), 2);
        assert_eq!(pacer.next(&cancel).await, Step::EndOfCycle);

        pacer.restart();
        let first = pacer.next(&cancel).await;
        assert!(matches!(first, Step::Due(r) if r.payload_str() == "r0"));
        // First record of the new cycle is not delayed
        assert_eq!(clock.elapsed(), Duration::from_secs(1));

        assert!(matches!(pacer.next(&cancel).await, Step::Due(_)));
        assert_eq!(clock.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_empty_sequence_ends_immediately() {
        let clock = ManualClock::new();
        let cancel = CancellationToken::new();
        let mut pacer = Pacer::new(&[], SpeedFactor::REAL_TIME, &clock);
        assert_eq!(pacer.next(&cancel).await, Step::EndOfCycle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_wait() {
        let records = records_at(&[0, 60_000]);
        let clock = TokioClock;
        let cancel = CancellationToken::new();
        let mut pacer = Pacer::new(&records, SpeedFactor::REAL_TIME, &clock);

        assert!(matches!(pacer.next(&cancel).await, Step::Due(_)));

        let start = Instant::now();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        assert_eq!(pacer.next(&cancel).await, Step::Cancelled);
        assert!(Instant::now() - start < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cancelled_before_wait() {
        let records = records_at(&[0, 1000]);
        let clock = ManualClock::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut pacer = Pacer::new(&records, SpeedFactor::REAL_TIME, &clock);
        assert_eq!(pacer.next(&cancel).await, Step::Cancelled);
        assert_eq!(pacer.position(), 0);
    }

    #[test]
    fn test_schedule() {
        let records = records_at(&[0, 1000, 3000]);
        let offsets = schedule(&records, SpeedFactor::new(10.0).unwrap());
        assert_eq!(
            offsets,
            vec![
                Duration::ZERO,
                Duration::from_millis(100),
                Duration::from_millis(300)
            ]
        );
        assert!(schedule(&[], SpeedFactor::REAL_TIME).is_empty());
    }

    /// Drain one cycle, returning each record's index and due offset
    fn replay_with_manual_clock(
        records: &[Record],
        speed: SpeedFactor,
    ) -> Vec<(usize, Duration)> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        runtime.block_on(async {
            let clock = ManualClock::new();
            let cancel = CancellationToken::new();
            let mut pacer = Pacer::new(records, speed, &clock);

            let mut due = Vec::new();
            while let Step::Due(record) = pacer.next(&cancel).await {
                let index = records
                    .iter()
                    .position(|r| std::ptr::eq(r, record))
                    .unwrap();
                due.push((index, clock.elapsed()));
            }
            due
        })
    }

    proptest! {
        #[test]
        fn prop_pacer_keeps_order_and_never_waits_backwards(
            offsets in prop::collection::vec(-50_000i64..50_000, 0..40),
            speed in 0.1f64..100.0,
        ) {
            let records = records_at(&offsets);
            let speed = SpeedFactor::new(speed).unwrap();
            let due = replay_with_manual_clock(&records, speed);

            let order: Vec<usize> = due.iter().map(|(i, _)| *i).collect();
            prop_assert_eq!(order, (0..records.len()).collect::<Vec<_>>());

            let mut expected = Duration::ZERO;
            for ((i, elapsed), offset) in due.iter().zip(schedule(&records, speed)) {
                expected = expected.max(offset);
                prop_assert_eq!(*elapsed, expected);

                if *i > 0 && records[*i].timestamp <= records[*i - 1].timestamp {
                    prop_assert_eq!(*elapsed, due[*i - 1].1);
                }
            }
        }
    }
}
