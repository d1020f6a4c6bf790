//! Synthetic IIoT dataset generator
//!
//! Produces one simulated production day for a single machine in the CSV
//! layout the replayer reads (`ts_iso,topic,payload_json,...`), so a demo
//! stream can be replayed without a real capture.

mod profile;

use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, TimeDelta, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::{CadenceError, Result};

pub use profile::{random_state, scheduled_state, MachineState, MinuteOfDay};

/// Seconds after local midnight of the last sample
const LAST_SAMPLE_SECS: i64 = 23 * 3600 + 59 * 60 + 50;

/// Generator parameters
#[derive(Debug, Clone)]
pub struct DatasetParams {
    /// Site identifier
    pub site: String,
    /// Production line identifier
    pub line: String,
    /// Machine identifier
    pub machine: String,
    /// Local calendar day to simulate
    pub date: NaiveDate,
    /// Local UTC offset in minutes
    pub utc_offset_minutes: i32,
    /// Sampling interval in seconds
    pub interval_secs: u32,
    /// Ideal cycle time per part in seconds
    pub ideal_cycle_secs: f64,
    /// Probability that a produced part is rejected
    pub reject_rate: f64,
    /// RNG seed
    pub seed: u64,
}

impl Default for DatasetParams {
    fn default() -> Self {
        Self {
            site: "blr".to_string(),
            line: "line1".to_string(),
            machine: "SF-01".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 9, 17).unwrap_or_default(),
            utc_offset_minutes: 5 * 60 + 30,
            interval_secs: 10,
            ideal_cycle_secs: 12.0,
            reject_rate: 0.02,
            seed: 7,
        }
    }
}

impl DatasetParams {
    /// Validate parameters
    ///
    /// # Errors
    ///
    /// Returns a configuration error for out-of-range values
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(CadenceError::Config(
                "interval must be at least one second".to_string(),
            ));
        }

        if !(self.ideal_cycle_secs.is_finite() && self.ideal_cycle_secs > 0.0) {
            return Err(CadenceError::Config(format!(
                "ideal cycle time must be positive, got {}",
                self.ideal_cycle_secs
            )));
        }

        if !(0.0..=1.0).contains(&self.reject_rate) {
            return Err(CadenceError::Config(format!(
                "reject rate must be within 0..=1, got {}",
                self.reject_rate
            )));
        }

        let segments = [
            ("site", &self.site),
            ("line", &self.line),
            ("machine", &self.machine),
        ];
        for (name, value) in segments {
            if value.is_empty() || value.contains(|c: char| matches!(c, '/' | '+' | '#')) {
                return Err(CadenceError::Config(format!(
                    "{name} must be a non-empty topic segment, got '{value}'"
                )));
            }
        }

        self.offset().map(|_| ())
    }

    /// Topic root `symbiotic/{site}/{line}/{machine}`
    pub fn topic_root(&self) -> String {
        format!("symbiotic/{}/{}/{}", self.site, self.line, self.machine)
    }

    fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            CadenceError::Config(format!(
                "UTC offset out of range: {} minutes",
                self.utc_offset_minutes
            ))
        })
    }

    /// Local sample instants from midnight to 23:59:50
    fn sample_times(&self) -> Result<Vec<DateTime<FixedOffset>>> {
        let start = self
            .date
            .and_hms_opt(0, 0, 0)
            .and_then(|naive| naive.and_local_timezone(self.offset().ok()?).single())
            .ok_or_else(|| CadenceError::Config(format!("invalid date {}", self.date)))?;

        let last = start + TimeDelta::seconds(LAST_SAMPLE_SECS);
        let step = TimeDelta::seconds(i64::from(self.interval_secs));

        let mut times = Vec::new();
        let mut t = start;
        while t <= last {
            times.push(t);
            t += step;
        }
        Ok(times)
    }
}

/// One CSV row of the generated dataset
#[derive(Debug, Clone, Serialize)]
pub struct DatasetRow {
    /// ISO 8601 timestamp with offset
    pub ts_iso: String,
    /// Full MQTT topic
    pub topic: String,
    /// Compact JSON payload
    pub payload_json: String,
    /// Site identifier
    pub site: String,
    /// Line identifier
    pub line: String,
    /// Machine identifier
    pub machine: String,
    /// Topic object segment (`state`, `counter`, ...)
    pub object: String,
    /// Topic metric segment
    pub metric: String,
}

/// JSON payload; field order is part of the wire format
#[derive(Serialize)]
struct Payload<'a> {
    ts: &'a str,
    value: Value,
    q: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'static str>,
}

/// Per-sample machine snapshot
struct Sample {
    state: MachineState,
    parts_total: u64,
    parts_good: u64,
    run_minutes: f64,
    motor_current: f64,
}

/// Builds rows for one machine
struct RowWriter<'a> {
    params: &'a DatasetParams,
    root: String,
    rows: Vec<DatasetRow>,
}

impl RowWriter<'_> {
    fn push(
        &mut self,
        ts: &str,
        object: &str,
        metric: &str,
        value: Value,
        unit: Option<&'static str>,
    ) -> Result<()> {
        let payload = serde_json::to_string(&Payload {
            ts,
            value,
            q: "good",
            unit,
        })
        .map_err(|e| CadenceError::Other(format!("Failed to encode payload: {e}")))?;

        self.rows.push(DatasetRow {
            ts_iso: ts.to_string(),
            topic: format!("{}/{object}/{metric}", self.root),
            payload_json: payload,
            site: self.params.site.clone(),
            line: self.params.line.clone(),
            machine: self.params.machine.clone(),
            object: object.to_string(),
            metric: metric.to_string(),
        });
        Ok(())
    }
}

/// Generate the dataset rows in memory
///
/// # Errors
///
/// Returns a configuration error if the parameters are invalid
pub fn generate(params: &DatasetParams) -> Result<Vec<DatasetRow>> {
    params.validate()?;

    let times = params.sample_times()?;
    let samples = simulate(params, &times)?;

    let mut writer = RowWriter {
        params,
        root: params.topic_root(),
        rows: Vec::with_capacity(times.len() * 6 + 1),
    };

    for (i, (t, sample)) in times.iter().zip(&samples).enumerate() {
        let ts = t.to_rfc3339_opts(SecondsFormat::Secs, false);

        if i == 0 {
            let ideal = Value::from(params.ideal_cycle_secs);
            writer.push(&ts, "config", "ideal_ct_s", ideal, Some("s"))?;
        }

        let state = sample.state;
        writer.push(&ts, "state", "state_code", Value::from(state.code()), None)?;
        writer.push(&ts, "state", "running", Value::from(state.is_running()), None)?;

        let total = Value::from(sample.parts_total);
        writer.push(&ts, "counter", "parts_total", total, Some("count"))?;
        let good = Value::from(sample.parts_good);
        writer.push(&ts, "counter", "parts_good", good, Some("count"))?;

        let run = Value::from(sample.run_minutes);
        writer.push(&ts, "kpi", "run_minutes_today", run, Some("min"))?;
        let current = Value::from(sample.motor_current);
        writer.push(&ts, "sensor", "motor_current_a", current, Some("A"))?;
    }

    Ok(writer.rows)
}

/// Run the machine model over the sample instants
fn simulate(params: &DatasetParams, times: &[DateTime<FixedOffset>]) -> Result<Vec<Sample>> {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let interval = f64::from(params.interval_secs);

    let states: Vec<MachineState> = times
        .iter()
        .map(|t| {
            let minute: MinuteOfDay = t.hour() * 60 + t.minute();
            scheduled_state(minute, random_state(minute, &mut rng))
        })
        .collect();

    let mut parts_total = 0u64;
    let mut parts_good = 0u64;
    let mut run_secs = 0.0;
    let mut cycle_accum = 0.0;
    let mut counters = Vec::with_capacity(states.len());

    for state in &states {
        if state.is_running() {
            run_secs += interval;
            cycle_accum += interval;
            while cycle_accum >= params.ideal_cycle_secs {
                cycle_accum -= params.ideal_cycle_secs;
                parts_total += 1;
                if rng.random::<f64>() >= params.reject_rate {
                    parts_good += 1;
                }
            }
        }
        counters.push((parts_total, parts_good, run_secs / 60.0));
    }

    let mut samples = Vec::with_capacity(states.len());
    for (state, (total, good, run_minutes)) in states.into_iter().zip(counters) {
        let (mean, std_dev) = state.motor_current();
        let noise = Normal::new(mean, std_dev)
            .map_err(|e| CadenceError::Other(format!("Invalid current model: {e}")))?;

        samples.push(Sample {
            state,
            parts_total: total,
            parts_good: good,
            run_minutes,
            motor_current: noise.sample(&mut rng),
        });
    }

    Ok(samples)
}

/// Write rows as CSV with a header
///
/// # Errors
///
/// Returns error if the file cannot be written
pub fn write_csv(rows: &[DatasetRow], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Generate a dataset and write it to `path`, returning the row count
///
/// # Errors
///
/// Returns error if parameters are invalid or the file cannot be written
pub fn generate_to_file(params: &DatasetParams, path: &Path) -> Result<usize> {
    let rows = generate(params)?;
    write_csv(&rows, path)?;

    info!(
        path = %path.display(),
        rows = rows.len(),
        machine = %params.topic_root(),
        "Generated dataset"
    );

    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn payload(row: &DatasetRow) -> Value {
        serde_json::from_str(&row.payload_json).unwrap()
    }

    #[test]
    fn test_full_day_row_count() {
        let rows = generate(&DatasetParams::default()).unwrap();
        // 8640 samples * 6 metrics + one config row
        assert_eq!(rows.len(), 8640 * 6 + 1);
    }

    #[test]
    fn test_first_rows() {
        let rows = generate(&DatasetParams::default()).unwrap();

        assert_eq!(rows[0].topic, "symbiotic/blr/line1/SF-01/config/ideal_ct_s");
        assert_eq!(rows[0].ts_iso, "2025-09-17T00:00:00+05:30");
        assert_eq!(
            rows[0].payload_json,
            "{\"ts\":\"2025-09-17T00:00:00+05:30\",\"value\":12.0,\"q\":\"good\",\"unit\":\"s\"}"
        );

        assert_eq!(rows[1].topic, "symbiotic/blr/line1/SF-01/state/state_code");
        assert!(!rows[1].payload_json.contains("unit"));
        assert_eq!(rows[6].metric, "motor_current_a");

        let last = rows.last().unwrap();
        assert_eq!(last.ts_iso, "2025-09-17T23:59:50+05:30");
    }

    #[test]
    fn test_deterministic_for_seed() {
        let params = DatasetParams::default();
        let a = generate(&params).unwrap();
        let b = generate(&params).unwrap();
        assert_eq!(a[500].payload_json, b[500].payload_json);

        let other = generate(&DatasetParams {
            seed: 8,
            ..DatasetParams::default()
        })
        .unwrap();
        assert!(a
            .iter()
            .zip(&other)
            .any(|(x, y)| x.payload_json != y.payload_json));
    }

    #[test]
    fn test_counters_are_monotonic() {
        let rows = generate(&DatasetParams::default()).unwrap();

        let values = |metric: &str| -> Vec<u64> {
            rows.iter()
                .filter(|r| r.metric == metric)
                .map(|r| payload(r)["value"].as_u64().unwrap())
                .collect()
        };
        let total = values("parts_total");
        let good = values("parts_good");

        assert!(total.windows(2).all(|w| w[0] <= w[1]));
        assert!(good.iter().zip(&total).all(|(g, t)| g <= t));
        assert!(*total.last().unwrap() > 0);
    }

    #[test]
    fn test_planned_idle_window() {
        let rows = generate(&DatasetParams::default()).unwrap();
        let lunch = rows
            .iter()
            .filter(|r| r.metric == "state_code" && r.ts_iso.starts_with("2025-09-17T13:1"))
            .collect::<Vec<_>>();

        assert!(!lunch.is_empty());
        assert!(lunch.iter().all(|r| payload(r)["value"] == 3));
    }

    #[test]
    fn test_invalid_params() {
        let bad = [
            DatasetParams {
                interval_secs: 0,
                ..DatasetParams::default()
            },
            DatasetParams {
                ideal_cycle_secs: 0.0,
                ..DatasetParams::default()
            },
            DatasetParams {
                reject_rate: 1.5,
                ..DatasetParams::default()
            },
            DatasetParams {
                machine: "SF/01".to_string(),
                ..DatasetParams::default()
            },
            DatasetParams {
                utc_offset_minutes: 24 * 60,
                ..DatasetParams::default()
            },
        ];

        for params in bad {
            assert!(matches!(generate(&params), Err(CadenceError::Config(_))));
        }
    }

    #[test]
    fn test_generate_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("simple_day.csv");
        let params = DatasetParams {
            interval_secs: 3600,
            ..DatasetParams::default()
        };

        let count = generate_to_file(&params, &path).unwrap();
        assert_eq!(count, 24 * 6 + 1);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("ts_iso,topic,payload_json,site,line,machine,object,metric\n"));
    }
}
