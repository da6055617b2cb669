//! Writers for aggregated signal records.
//!
//! Patients and providers go to separate files,
//! `patient_signals.<ext>` and `provider_signals.<ext>`.

use crate::core::record::SignalRecord;
use crate::error::{PipelineError, Result};
use crate::ingest::codes::{PersonCategory, RoomCode};
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Output timestamp layout.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Default scale applied to weights before rounding into CSV cells.
pub const DEFAULT_SIGNAL_MULTIPLIER: f64 = 1_000_000.0;

/// Receives signal records in emission order.
pub trait SignalSink {
    fn emit(&mut self, record: &SignalRecord) -> Result<()>;

    /// Flush and close any underlying files.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<SignalRecord>,
}

impl SignalSink for MemorySink {
    fn emit(&mut self, record: &SignalRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    #[value(name = "csv_gz")]
    CsvGz,
    Jsonl,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::CsvGz => "csv.gz",
            ExportFormat::Jsonl => "jsonl",
        }
    }

    fn compressed(self) -> bool {
        matches!(self, ExportFormat::CsvGz)
    }
}

/// Path of the output file for one category.
pub fn output_path(dir: &Path, category: PersonCategory, format: ExportFormat) -> PathBuf {
    dir.join(format!("{}_signals.{}", category.label(), format.extension()))
}

/// Open the writer for `format` inside `dir`.
pub fn open_sink(
    dir: &Path,
    format: ExportFormat,
    signal_multiplier: f64,
) -> Result<Box<dyn SignalSink + Send>> {
    std::fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
    Ok(match format {
        ExportFormat::Csv | ExportFormat::CsvGz => {
            Box::new(CsvSignalWriter::create(dir, format, signal_multiplier)?)
        }
        ExportFormat::Jsonl => Box::new(JsonlSignalWriter::create(dir)?),
    })
}

/// A file, optionally gzip-compressed.
enum Output {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Output {
    fn create(path: &Path, compressed: bool) -> Result<Self> {
        let file = BufWriter::new(File::create(path).map_err(|e| PipelineError::io(path, e))?);
        Ok(if compressed {
            Output::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            Output::Plain(file)
        })
    }

    fn close(self) -> io::Result<()> {
        match self {
            Output::Plain(mut w) => w.flush(),
            Output::Gzip(w) => w.finish()?.flush(),
        }
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Plain(w) => w.write(buf),
            Output::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Plain(w) => w.flush(),
            Output::Gzip(w) => w.flush(),
        }
    }
}

/// CSV with one column per room, in room ordinal order.
pub struct CsvSignalWriter {
    patients: Option<csv::Writer<Output>>,
    providers: Option<csv::Writer<Output>>,
    patient_path: PathBuf,
    provider_path: PathBuf,
    multiplier: f64,
    row: Vec<String>,
}

impl CsvSignalWriter {
    pub fn create(dir: &Path, format: ExportFormat, multiplier: f64) -> Result<Self> {
        let patient_path = output_path(dir, PersonCategory::Patient, format);
        let provider_path = output_path(dir, PersonCategory::Provider, format);

        let mut patients =
            csv::Writer::from_writer(Output::create(&patient_path, format.compressed())?);
        patients
            .write_record(header(PersonCategory::Patient))
            .map_err(|e| PipelineError::csv(&patient_path, e))?;

        let mut providers =
            csv::Writer::from_writer(Output::create(&provider_path, format.compressed())?);
        providers
            .write_record(header(PersonCategory::Provider))
            .map_err(|e| PipelineError::csv(&provider_path, e))?;

        Ok(Self {
            patients: Some(patients),
            providers: Some(providers),
            patient_path,
            provider_path,
            multiplier,
            row: Vec::with_capacity(RoomCode::COUNT + 5),
        })
    }
}

/// Column names for a category's file.
pub fn header(category: PersonCategory) -> Vec<&'static str> {
    let mut columns = match category {
        PersonCategory::Patient => vec!["TagId", "CSN", "ClarityStart", "ClarityEnd", "Time"],
        PersonCategory::Provider => vec!["TagId", "UMid", "Time"],
    };
    columns.extend(RoomCode::ALL.iter().map(|r| r.name()));
    columns
}

fn format_time(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_default()
}

impl SignalSink for CsvSignalWriter {
    fn emit(&mut self, record: &SignalRecord) -> Result<()> {
        self.row.clear();
        self.row.push(record.tag_id.to_string());
        match record.category {
            PersonCategory::Patient => {
                self.row.push(record.csn.to_string());
                self.row.push(format_time(record.visit.map(|v| v.check_in)));
                self.row
                    .push(format_time(record.visit.and_then(|v| v.check_out)));
            }
            PersonCategory::Provider => self.row.push(record.umid.to_string()),
        }
        self.row.push(record.minute.format(TIME_FORMAT).to_string());
        for &mass in record.signals.as_slice() {
            self.row.push(format!("{:.0}", self.multiplier * mass));
        }

        let (writer, path) = match record.category {
            PersonCategory::Patient => (self.patients.as_mut(), &self.patient_path),
            PersonCategory::Provider => (self.providers.as_mut(), &self.provider_path),
        };
        let writer = writer.ok_or_else(|| {
            PipelineError::io(path, io::Error::new(io::ErrorKind::Other, "writer already finished"))
        })?;
        writer
            .write_record(&self.row)
            .map_err(|e| PipelineError::csv(path, e))
    }

    fn finish(&mut self) -> Result<()> {
        for (writer, path) in [
            (self.patients.take(), &self.patient_path),
            (self.providers.take(), &self.provider_path),
        ] {
            if let Some(writer) = writer {
                let output = writer
                    .into_inner()
                    .map_err(|e| PipelineError::io(path, e.into_error()))?;
                output.close().map_err(|e| PipelineError::io(path, e))?;
            }
        }
        Ok(())
    }
}

/// One JSON object per line.
pub struct JsonlSignalWriter {
    patients: Option<Output>,
    providers: Option<Output>,
    patient_path: PathBuf,
    provider_path: PathBuf,
}

impl JsonlSignalWriter {
    pub fn create(dir: &Path) -> Result<Self> {
        let patient_path = output_path(dir, PersonCategory::Patient, ExportFormat::Jsonl);
        let provider_path = output_path(dir, PersonCategory::Provider, ExportFormat::Jsonl);
        Ok(Self {
            patients: Some(Output::create(&patient_path, false)?),
            providers: Some(Output::create(&provider_path, false)?),
            patient_path,
            provider_path,
        })
    }
}

impl SignalSink for JsonlSignalWriter {
    fn emit(&mut self, record: &SignalRecord) -> Result<()> {
        let (output, path) = match record.category {
            PersonCategory::Patient => (self.patients.as_mut(), &self.patient_path),
            PersonCategory::Provider => (self.providers.as_mut(), &self.provider_path),
        };
        let output = output.ok_or_else(|| {
            PipelineError::io(path, io::Error::new(io::ErrorKind::Other, "writer already finished"))
        })?;
        serde_json::to_writer(&mut *output, record).map_err(|e| PipelineError::json(path, e))?;
        output
            .write_all(b"\n")
            .map_err(|e| PipelineError::io(path, e))
    }

    fn finish(&mut self) -> Result<()> {
        for (output, path) in [
            (self.patients.take(), &self.patient_path),
            (self.providers.take(), &self.provider_path),
        ] {
            if let Some(output) = output {
                output.close().map_err(|e| PipelineError::io(path, e))?;
            }
        }
        Ok(())
    }
}
