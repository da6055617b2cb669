//! Reading one day's raw feed file.
//!
//! Day files are named `YYYY-MM-DD<suffix>` and hold headerless CSV rows of
//! `ping, sensor, tag, detection time, signal, reads`. Names ending in `.gz`
//! are decompressed on the fly.

use crate::audit::ValidationCounters;
use crate::core::grouping::Partitioned;
use crate::error::{PipelineError, Result};
use crate::ingest::parse::{OperatingHours, RecordParser};
use chrono::NaiveDate;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default day-file suffix after the ISO date.
pub const DEFAULT_FILE_SUFFIX: &str = "_APD.csv.gz";

/// One day of kept records, sorted for aggregation, and its tallies.
#[derive(Debug, Clone)]
pub struct DayBatch {
    pub date: NaiveDate,
    pub records: Partitioned,
    pub counters: ValidationCounters,
}

/// Location of the feed file for `date`.
pub fn day_file_path(dir: &Path, date: NaiveDate, suffix: &str) -> PathBuf {
    dir.join(format!("{}{}", date.format("%Y-%m-%d"), suffix))
}

/// Read, validate and sort one day file.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn read_day(
    path: &Path,
    date: NaiveDate,
    parser: &RecordParser<'_>,
    hours: &OperatingHours,
) -> Result<Option<DayBatch>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No feed file for day");
            return Ok(None);
        }
        Err(e) => return Err(PipelineError::io(path, e)),
    };

    info!(path = %path.display(), "Reading feed file");
    let gzipped = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    let input: Box<dyn Read> = if gzipped {
        Box::new(MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let batch = read_rows(input, date, parser, hours).map_err(|e| PipelineError::csv(path, e))?;
    info!(
        date = %date,
        total = batch.counters.total_records,
        kept = batch.counters.final_records,
        "Day file read"
    );
    Ok(Some(batch))
}

/// Screen every row of `input` into a [`DayBatch`].
///
/// Rows the CSV layer cannot decode count as unreadable; an I/O failure of
/// the underlying stream aborts the day.
pub fn read_rows<R: Read>(
    input: R,
    date: NaiveDate,
    parser: &RecordParser<'_>,
    hours: &OperatingHours,
) -> std::result::Result<DayBatch, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);

    let mut counters = ValidationCounters::new();
    let mut records = Partitioned::default();
    let mut row = csv::StringRecord::new();
    loop {
        match reader.read_record(&mut row) {
            Ok(false) => break,
            Ok(true) => {
                let fields: Vec<&str> = row.iter().collect();
                if let Some(record) = parser.screen(&fields, hours, &mut counters) {
                    records.push(record);
                }
            }
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e),
            Err(e) => {
                warn!(error = %e, "Unreadable feed row");
                counters.record_unreadable();
            }
        }
    }

    records.sort();
    Ok(DayBatch {
        date,
        records,
        counters,
    })
}
