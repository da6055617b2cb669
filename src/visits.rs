//! Optional enrichment of patient signal records with scheduled visit times.
//!
//! A visit is identified by its contact serial number (CSN). The same CSN can
//! appear on several scheduling rows; the row whose check-in falls on the day
//! being processed is the match.

use crate::error::{PipelineError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Check-in and check-out of one visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitWindow {
    pub check_in: DateTime<Utc>,
    pub check_out: Option<DateTime<Utc>>,
}

/// One scheduling row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub csn: u64,
    pub window: VisitWindow,
}

/// Source of visit windows, consulted once per patient run.
pub trait VisitLookup: Send + Sync {
    fn find(&self, csn: u64, date: NaiveDate) -> Option<VisitWindow>;
}

/// Visits sorted by CSN for binary search.
#[derive(Debug, Clone, Default)]
pub struct VisitIndex {
    visits: Vec<VisitRecord>,
}

#[derive(Debug, Deserialize)]
struct VisitRow {
    #[serde(rename = "CSN")]
    csn: String,
    #[serde(rename = "CheckInTime")]
    check_in: String,
    #[serde(rename = "CheckOutTime", default)]
    check_out: String,
}

impl VisitIndex {
    pub fn new(mut visits: Vec<VisitRecord>) -> Self {
        // Stable: rows sharing a CSN keep their file order.
        visits.sort_by_key(|v| v.csn);
        Self { visits }
    }

    /// Load a CSV with header `CSN,CheckInTime,CheckOutTime`.
    pub fn load_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| PipelineError::csv(path, e))?;

        let mut visits = Vec::new();
        for (i, row) in reader.deserialize::<VisitRow>().enumerate() {
            // Header is line 1.
            let line = i as u64 + 2;
            let row = row.map_err(|e| PipelineError::csv(path, e))?;
            visits.push(parse_row(&row).map_err(|message| PipelineError::VisitRecord {
                line,
                message,
            })?);
        }
        Ok(Self::new(visits))
    }

    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }
}

impl VisitLookup for VisitIndex {
    /// CSN 0 never matches. When several rows match the day, the last one in
    /// file order wins.
    fn find(&self, csn: u64, date: NaiveDate) -> Option<VisitWindow> {
        if csn == 0 {
            return None;
        }
        let start = self.visits.partition_point(|v| v.csn < csn);
        self.visits[start..]
            .iter()
            .take_while(|v| v.csn == csn)
            .filter(|v| v.window.check_in.date_naive() == date)
            .last()
            .map(|v| v.window)
    }
}

fn parse_row(row: &VisitRow) -> std::result::Result<VisitRecord, String> {
    let csn = row
        .csn
        .parse::<u64>()
        .map_err(|e| format!("CSN '{}': {e}", row.csn))?;
    let check_in = parse_time(&row.check_in)
        .ok_or_else(|| format!("CheckInTime '{}' is not a timestamp", row.check_in))?;
    let check_out = if row.check_out.is_empty() {
        None
    } else {
        Some(
            parse_time(&row.check_out)
                .ok_or_else(|| format!("CheckOutTime '{}' is not a timestamp", row.check_out))?,
        )
    };
    Ok(VisitRecord {
        csn,
        window: VisitWindow {
            check_in,
            check_out,
        },
    })
}

/// RFC 3339, or a naive UTC time as `YYYY-MM-DDTHH:MM[:SS]` / `YYYY-MM-DD HH:MM[:SS]`.
fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .map(|t| t.and_utc())
}
