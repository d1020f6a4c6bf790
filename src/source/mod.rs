//! Record sources feeding the replay

mod csv_file;
mod timestamp;

pub use csv_file::CsvSource;
pub use timestamp::parse_timestamp;

use crate::record::Record;
use crate::Result;

/// Produces the ordered, finite record sequence for a run
pub trait RecordSource {
    /// Load every record, in source order
    ///
    /// # Errors
    ///
    /// Returns a configuration or source error if the records cannot be read
    fn load(&self) -> Result<Vec<Record>>;
}
