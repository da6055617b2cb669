//! Batch reports persisted after each processed day.

use crate::audit::counters::ValidationCounters;
use crate::error::{PipelineError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Outcome of processing one day of feed data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Run this day belonged to
    pub run_id: Uuid,
    pub date: NaiveDate,
    pub counters: ValidationCounters,
    /// Distinct patient visits with at least one kept ping
    pub patient_entities: u64,
    /// Distinct providers with at least one kept ping
    pub provider_entities: u64,
    /// Signal records emitted
    pub windows_emitted: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    /// File name for a day's report inside a reports directory.
    pub fn file_name(date: NaiveDate) -> String {
        format!("{}.json", date.format("%Y-%m-%d"))
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
        let path = dir.join(Self::file_name(self.date));
        let json =
            serde_json::to_string_pretty(self).map_err(|e| PipelineError::json(&path, e))?;
        std::fs::write(&path, json).map_err(|e| PipelineError::io(&path, e))?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| PipelineError::json(path, e))
    }

    /// All reports in a directory, oldest day first.
    pub fn load_dir(dir: &Path) -> Result<Vec<Self>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut reports = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))? {
            let path = entry.map_err(|e| PipelineError::io(dir, e))?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                reports.push(Self::load(&path)?);
            }
        }
        reports.sort_by_key(|r| r.date);
        Ok(reports)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} ({} patient visits, {} providers, {} windows)\n{}",
            self.date,
            self.patient_entities,
            self.provider_entities,
            self.windows_emitted,
            self.counters.summary()
        )
    }
}

/// Totals across every day of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub days_processed: u64,
    /// Days in the requested range with no feed file
    pub days_missing: u64,
    pub counters: ValidationCounters,
    pub windows_emitted: u64,
    pub started_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            days_processed: 0,
            days_missing: 0,
            counters: ValidationCounters::new(),
            windows_emitted: 0,
            started_at: Utc::now(),
        }
    }

    pub fn record_day(&mut self, report: &BatchReport) {
        self.days_processed += 1;
        self.counters.merge(&report.counters);
        self.windows_emitted += report.windows_emitted;
    }

    pub fn record_missing_day(&mut self) {
        self.days_missing += 1;
    }

    pub fn summary(&self) -> String {
        format!(
            "Run {}:\n\
             - Days processed: {}\n\
             - Days without data: {}\n\
             - Windows emitted: {}\n\
             - Elapsed: {} seconds\n\
             \n\
             {}",
            self.run_id,
            self.days_processed,
            self.days_missing,
            self.windows_emitted,
            (Utc::now() - self.started_at).num_seconds(),
            self.counters.summary()
        )
    }
}
