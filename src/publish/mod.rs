//! Publisher adapters delivering records to the messaging channel

mod line;
mod mqtt;

use async_trait::async_trait;

use crate::record::Record;
use crate::Result;

pub use line::LinePublisher;
pub use mqtt::MqttPublisher;

/// Time allowed for a publisher to flush and disconnect
pub const SHUTDOWN_TIMEOUT_MS: u64 = 5000;

/// Time a publish waits for the first broker connection to settle
pub const CONNECT_TIMEOUT_MS: u64 = 5000;

/// Back-off between broker reconnection attempts
pub const RECONNECT_BACKOFF_MS: u64 = 1000;

/// Delivers a single record's payload under its topic
///
/// Implementations are long-lived and called strictly sequentially.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish one record
    ///
    /// # Errors
    ///
    /// Returns [`crate::CadenceError::Delivery`] if the record could not be handed
    /// to the channel
    async fn publish(&self, record: &Record) -> Result<()>;

    /// Flush pending messages and release the connection
    ///
    /// # Errors
    ///
    /// Returns error if the transport could not be shut down cleanly
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
