//! CSV record source

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{parse_timestamp, RecordSource};
use crate::config::SourceConfig;
use crate::fingerprint::DatasetFingerprint;
use crate::record::Record;
use crate::{CadenceError, Result};

/// Loads records from a CSV file with a header row
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    timestamp_column: String,
    topic_column: String,
    payload_column: String,
    default_topic: Option<String>,
}

/// Where a row's topic comes from
enum TopicColumn {
    Column(usize),
    Fixed(String),
}

/// Column positions resolved from the header
struct Columns {
    timestamp: usize,
    topic: TopicColumn,
    payload: usize,
}

/// A row before timestamp back-filling
struct RawRow {
    line: u64,
    timestamp: Option<DateTime<Utc>>,
    topic: String,
    payload: Bytes,
}

impl CsvSource {
    /// Source with the default `ts_iso,topic,payload_json` layout
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::from_config(&SourceConfig {
            path: path.into(),
            ..SourceConfig::default()
        })
    }

    /// Source using the configured columns
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            path: config.path.clone(),
            timestamp_column: config.timestamp_column.clone(),
            topic_column: config.topic_column.clone(),
            payload_column: config.payload_column.clone(),
            default_topic: config.default_topic.clone(),
        }
    }

    /// Use this topic for files without a topic column
    #[must_use]
    pub fn with_default_topic(mut self, topic: impl Into<String>) -> Self {
        self.default_topic = Some(topic.into());
        self
    }

    /// Path of the CSV file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse records from in-memory CSV data
    ///
    /// # Errors
    ///
    /// Returns error if the header lacks a required column, a row cannot be
    /// decoded, or no row carries a parseable timestamp
    pub fn parse(&self, data: &[u8]) -> Result<Vec<Record>> {
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data);

        let columns = self.resolve_columns(reader.headers()?)?;

        let mut rows = Vec::new();
        for result in reader.records() {
            let row = result?;
            let line = row.position().map_or(0, ::csv::Position::line);
            let field = |index: usize| row.get(index).unwrap_or_default();

            let topic = match &columns.topic {
                TopicColumn::Column(index) => field(*index).to_string(),
                TopicColumn::Fixed(topic) => topic.clone(),
            };

            rows.push(RawRow {
                line,
                timestamp: parse_timestamp(field(columns.timestamp)),
                topic,
                payload: Bytes::copy_from_slice(field(columns.payload).as_bytes()),
            });
        }

        backfill(rows)
    }

    fn resolve_columns(&self, header: &::csv::StringRecord) -> Result<Columns> {
        let position = |name: &str| header.iter().position(|h| h.trim() == name);

        let timestamp = position(&self.timestamp_column).ok_or_else(|| {
            CadenceError::Config(format!(
                "CSV header has no timestamp column '{}'",
                self.timestamp_column
            ))
        })?;

        let payload = position(&self.payload_column).ok_or_else(|| {
            CadenceError::Config(format!(
                "CSV header has no payload column '{}'",
                self.payload_column
            ))
        })?;

        let topic = match (position(&self.topic_column), &self.default_topic) {
            (Some(index), _) => TopicColumn::Column(index),
            (None, Some(topic)) => TopicColumn::Fixed(topic.clone()),
            (None, None) => {
                return Err(CadenceError::Config(format!(
                    "CSV header has no topic column '{}' and no default topic is configured",
                    self.topic_column
                )))
            }
        };

        Ok(Columns {
            timestamp,
            topic,
            payload,
        })
    }
}

impl RecordSource for CsvSource {
    fn load(&self) -> Result<Vec<Record>> {
        let data = std::fs::read(&self.path).map_err(|e| {
            CadenceError::Config(format!("Cannot read {}: {e}", self.path.display()))
        })?;

        let records = self.parse(&data)?;
        let fingerprint = DatasetFingerprint::of(&data);

        match (records.first(), records.last()) {
            (Some(first), Some(last)) => info!(
                path = %self.path.display(),
                records = records.len(),
                fingerprint = %fingerprint.short(),
                first = %first.timestamp,
                last = %last.timestamp,
                "Loaded replay records"
            ),
            _ => warn!(
                path = %self.path.display(),
                fingerprint = %fingerprint.short(),
                "CSV source has no records"
            ),
        }

        Ok(records)
    }
}

/// Give rows with an unparseable timestamp the timestamp of the row before.
///
/// Rows preceding the first parseable timestamp take that timestamp, so no
/// row is dropped and none introduces a wait.
fn backfill(rows: Vec<RawRow>) -> Result<Vec<Record>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let Some(mut last) = rows.iter().find_map(|row| row.timestamp) else {
        return Err(CadenceError::Source(
            "No row has a parseable timestamp".to_string(),
        ));
    };

    let mut fallbacks = 0usize;
    let records = rows
        .into_iter()
        .map(|row| {
            let timestamp = if let Some(ts) = row.timestamp {
                last = ts;
                ts
            } else {
                fallbacks += 1;
                warn!(line = row.line, "Unparseable timestamp, reusing previous");
                last
            };
            Record {
                timestamp,
                topic: row.topic,
                payload: row.payload,
            }
        })
        .collect();

    if fallbacks > 0 {
        warn!(rows = fallbacks, "Rows replayed with a substituted timestamp");
    }

    Ok(records)
}
