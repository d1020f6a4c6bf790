//! Error types for Cadence

use std::io;
use thiserror::Error;

/// Result type for Cadence operations
pub type Result<T> = std::result::Result<T, CadenceError>;

/// Errors that can occur in Cadence
#[derive(Debug, Error)]
pub enum CadenceError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error (invalid speed factor, broker settings, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record source could not be loaded
    #[error("Record source error: {0}")]
    Source(String),

    /// CSV decoding/encoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A single record failed to publish
    #[error("Delivery to '{topic}' failed: {reason}")]
    Delivery {
        /// Topic the record was addressed to
        topic: String,
        /// Transport-level reason
        reason: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl CadenceError {
    /// Whether this error must abort the run.
    ///
    /// Delivery errors are contained per record; everything else is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Delivery { .. })
    }

    /// Shorthand for a delivery error
    pub fn delivery(topic: impl Into<String>, reason: impl ToString) -> Self {
        Self::Delivery {
            topic: topic.into(),
            reason: reason.to_string(),
        }
    }
}
