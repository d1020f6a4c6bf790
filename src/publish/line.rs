//! Line-oriented publisher for dry runs

use async_trait::async_trait;
use chrono::SecondsFormat;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

use super::Publisher;
use crate::record::Record;
use crate::{CadenceError, Result};

/// Writes `<timestamp> <topic> <payload>` lines instead of publishing
pub struct LinePublisher<W> {
    writer: Mutex<W>,
}

impl LinePublisher<Stdout> {
    /// Publisher printing to standard output
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> LinePublisher<W> {
    /// Wrap an arbitrary writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> Publisher for LinePublisher<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn publish(&self, record: &Record) -> Result<()> {
        let mut line = format!(
            "{} {} ",
            record.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            record.topic
        )
        .into_bytes();
        line.extend_from_slice(&record.payload);
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| CadenceError::delivery(&record.topic, e))
    }

    async fn close(&self) -> Result<()> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_writes_one_line_per_record() {
        let publisher = LinePublisher::new(Vec::new());
        let ts = Utc.with_ymd_and_hms(2025, 9, 17, 0, 0, 10).unwrap();

        publisher
            .publish(&Record::new(ts, "symbiotic/blr/state", "{\"value\":2}"))
            .await
            .unwrap();
        publisher
            .publish(&Record::new(ts, "symbiotic/blr/running", "true"))
            .await
            .unwrap();
        publisher.close().await.unwrap();

        let output = String::from_utf8(publisher.into_inner()).unwrap();
        assert_eq!(
            output,
            "2025-09-17T00:00:10Z symbiotic/blr/state {\"value\":2}\n\
             2025-09-17T00:00:10Z symbiotic/blr/running true\n"
        );
    }
}
