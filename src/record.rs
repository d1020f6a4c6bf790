//! Replay record type

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// One timestamped unit of replay data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Capture time of the original event
    pub timestamp: DateTime<Utc>,
    /// Topic to publish the payload under
    pub topic: String,
    /// Payload, transmitted verbatim
    pub payload: Bytes,
}

impl Record {
    /// Create a new record
    pub fn new(
        timestamp: DateTime<Utc>,
        topic: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            timestamp,
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload as UTF-8, lossy
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
