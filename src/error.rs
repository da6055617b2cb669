//! Fatal error types.
//!
//! Row-level validation failures are not errors: they are tallied in
//! [`ValidationCounters`](crate::audit::ValidationCounters) and the batch
//! keeps going. The variants here abort the current batch.

use crate::config::ConfigError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV error on {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("JSON error on {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Configuration failed: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid sensor table: {0}")]
    SensorTable(String),
    #[error("Invalid visit record at line {line}: {message}")]
    VisitRecord { line: u64, message: String },
    #[error(
        "Records out of order for {category} at index {index}: sort by entity then timestamp first"
    )]
    Unsorted { category: &'static str, index: usize },
    #[error("Record of {found} reached the {expected} aggregation run")]
    CategoryMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        PipelineError::Csv {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        PipelineError::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
