//! Raw feed ingestion: code tables, row validation and day files.

pub mod codes;
pub mod parse;
pub mod reader;
pub mod types;

pub use codes::{PersonCategory, ProviderCategory, RoomCode, SensorTable};
pub use parse::{Exclusion, OperatingHours, RecordParser, Rejection};
pub use reader::{day_file_path, read_day, DayBatch};
pub use types::{PingRecord, TagDetails};
