//! Per-day validation counters.
//!
//! A fresh `ValidationCounters` is created for every day of feed data and
//! passed by `&mut` into the parser; nothing outlives the batch.

use crate::ingest::parse::{Exclusion, Rejection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCounters {
    /// Rows read from the feed, including unreadable ones
    pub total_records: u64,
    /// Rows that survived validation and the opening-hours filter
    pub final_records: u64,
    /// Rows dropped before the 07:00 opening
    pub time_early: u64,
    /// Rows dropped at or after the 20:00 closing
    pub time_late: u64,
    /// Rows the CSV reader could not decode at all
    pub unreadable_rows: u64,
    /// Validation failures by category; absent categories are zero
    pub rejections: BTreeMap<Rejection, u64>,
}

impl ValidationCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_row(&mut self) {
        self.total_records += 1;
    }

    pub fn record_accepted(&mut self) {
        self.final_records += 1;
    }

    pub fn record_rejection(&mut self, rejection: Rejection) {
        *self.rejections.entry(rejection).or_insert(0) += 1;
    }

    pub fn record_exclusion(&mut self, exclusion: Exclusion) {
        match exclusion {
            Exclusion::TimeEarly => self.time_early += 1,
            Exclusion::TimeLate => self.time_late += 1,
        }
    }

    /// A row the CSV layer failed on; counted and skipped.
    pub fn record_unreadable(&mut self) {
        self.total_records += 1;
        self.unreadable_rows += 1;
    }

    pub fn rejected(&self, rejection: Rejection) -> u64 {
        self.rejections.get(&rejection).copied().unwrap_or(0)
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejections.values().sum()
    }

    /// `total == final + rejected + early + late + unreadable`.
    pub fn is_balanced(&self) -> bool {
        self.total_records
            == self.final_records
                + self.total_rejected()
                + self.time_early
                + self.time_late
                + self.unreadable_rows
    }

    /// Fold another batch's counters into this one.
    pub fn merge(&mut self, other: &ValidationCounters) {
        self.total_records += other.total_records;
        self.final_records += other.final_records;
        self.time_early += other.time_early;
        self.time_late += other.time_late;
        self.unreadable_rows += other.unreadable_rows;
        for (rejection, count) in &other.rejections {
            *self.rejections.entry(*rejection).or_insert(0) += count;
        }
    }

    /// Multi-line breakdown listing every category, zeros included.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Records read: {}\n\
             Records kept: {}\n\
             Before opening: {}\n\
             After closing: {}\n\
             Unreadable rows: {}\n\
             Rejected: {}\n",
            self.total_records,
            self.final_records,
            self.time_early,
            self.time_late,
            self.unreadable_rows,
            self.total_rejected()
        );
        for rejection in Rejection::ALL {
            out.push_str(&format!(
                "  - {}: {}\n",
                rejection.label(),
                self.rejected(rejection)
            ));
        }
        out
    }
}
