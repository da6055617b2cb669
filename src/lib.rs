//! RFID Signals - room signal vectors from clinic RFID ping feeds.
//!
//! Antennas in each room of a clinic report every badge they hear. This
//! library turns a day of those raw pings into, for every patient visit and
//! every provider, one vector per minute describing how strongly each room
//! heard them.
//!
//! # Guarantees
//!
//! - **Accounted rows**: every raw row is either kept or counted under exactly
//!   one rejection or exclusion category
//! - **Deterministic output**: the same day file always yields the same records
//!   in the same order
//! - **Per-day isolation**: counters and scratch buffers never outlive a day
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        RFID Signals                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Reader    │──▶│   Parser    │──▶│  Grouping   │       │
//! │  │ (day file)  │   │ (validate)  │   │ (sort/runs) │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                           │                 │               │
//! │                           ▼                 ▼               │
//! │                    ┌─────────────┐   ┌─────────────┐       │
//! │                    │ Validation  │   │  Windowing  │       │
//! │                    │  Counters   │   │ (1 min)     │       │
//! │                    └─────────────┘   └─────────────┘       │
//! │                                             │               │
//! │                                             ▼               │
//! │                    ┌─────────────┐   ┌─────────────┐       │
//! │                    │   Export    │◀──│   Signals   │       │
//! │                    │ (csv/jsonl) │   │ (top-K exp) │       │
//! │                    └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use rfid_signals::{core::DayPipeline, export::MemorySink, ingest, Config};
//! use chrono::NaiveDate;
//!
//! let config = Config::default();
//! let sensors = ingest::SensorTable::default();
//! let mut pipeline = DayPipeline::new(&sensors, config.hours, config.aggregation);
//!
//! let date = NaiveDate::from_ymd_opt(2018, 3, 5).unwrap();
//! let path = ingest::day_file_path(&config.data_dir, date, &config.file_suffix);
//! let mut sink = MemorySink::default();
//! if let Some(report) = pipeline.run_day(&path, date, uuid::Uuid::new_v4(), &mut sink).unwrap() {
//!     println!("{}", report.summary());
//! }
//! ```

pub mod audit;
pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod ingest;
pub mod visits;

// Re-export key types at crate root for convenience
pub use audit::{BatchReport, RunSummary, ValidationCounters};
pub use config::{Config, ConfigError};
pub use core::{DayPipeline, SignalAggregator, SignalRecord, SignalVector};
pub use error::{PipelineError, Result};
pub use export::{ExportFormat, MemorySink, SignalSink};
pub use ingest::{PingRecord, RecordParser, Rejection, RoomCode, SensorTable};
pub use visits::{VisitIndex, VisitLookup, VisitWindow};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
