//! Turning a day of sorted records into signal records.
//!
//! ```text
//! sorted partition -> entity runs -> minute windows -> signal vectors -> sink
//! ```
//!
//! Everything inside one day runs sequentially on one [`DayPipeline`]. Days
//! may be processed on separate pipelines in parallel.

use crate::audit::BatchReport;
use crate::core::grouping::{check_sorted, entity_runs};
use crate::core::record::SignalRecord;
use crate::core::signals::{AggregationSettings, SignalAggregator};
use crate::core::windowing::minute_windows;
use crate::error::Result;
use crate::export::SignalSink;
use crate::ingest::codes::{PersonCategory, SensorTable};
use crate::ingest::parse::{OperatingHours, RecordParser};
use crate::ingest::reader::{read_day, DayBatch};
use crate::ingest::types::PingRecord;
use crate::visits::VisitLookup;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// Counts from aggregating one partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionStats {
    pub entities: u64,
    pub windows: u64,
}

/// Parser, filter and aggregator for one day at a time.
pub struct DayPipeline<'a> {
    parser: RecordParser<'a>,
    hours: OperatingHours,
    aggregator: SignalAggregator,
    visits: Option<&'a dyn VisitLookup>,
}

impl<'a> DayPipeline<'a> {
    pub fn new(
        sensors: &'a SensorTable,
        hours: OperatingHours,
        settings: AggregationSettings,
    ) -> Self {
        Self {
            parser: RecordParser::new(sensors),
            hours,
            aggregator: SignalAggregator::new(settings),
            visits: None,
        }
    }

    /// Attach visit windows to patient records.
    pub fn with_visits(mut self, visits: &'a dyn VisitLookup) -> Self {
        self.visits = Some(visits);
        self
    }

    /// Aggregate one category's records, sorted by entity then time.
    ///
    /// Fails without emitting anything if the records are out of order or
    /// contain another category.
    pub fn aggregate(
        &mut self,
        category: PersonCategory,
        records: &[PingRecord],
        sink: &mut dyn SignalSink,
    ) -> Result<PartitionStats> {
        check_sorted(records, category)?;

        let mut stats = PartitionStats::default();
        for run in entity_runs(records) {
            stats.entities += 1;
            let visit = match (category, self.visits) {
                (PersonCategory::Patient, Some(visits)) => {
                    visits.find(run[0].csn(), run[0].timestamp.date_naive())
                }
                _ => None,
            };
            for window in minute_windows(run) {
                let signals = self.aggregator.aggregate(&window);
                sink.emit(&SignalRecord::from_window(&window, signals, visit))?;
                stats.windows += 1;
            }
        }
        debug!(
            category = %category,
            entities = stats.entities,
            windows = stats.windows,
            "Partition aggregated"
        );
        Ok(stats)
    }

    /// Aggregate both partitions of a batch, patients first.
    pub fn process_batch(
        &mut self,
        batch: &DayBatch,
        run_id: Uuid,
        sink: &mut dyn SignalSink,
    ) -> Result<BatchReport> {
        let started_at = Utc::now();
        self.report(batch, run_id, started_at, sink)
    }

    /// Read the day file at `path` and aggregate it.
    ///
    /// Returns `Ok(None)` when there is no file for the day.
    pub fn run_day(
        &mut self,
        path: &Path,
        date: NaiveDate,
        run_id: Uuid,
        sink: &mut dyn SignalSink,
    ) -> Result<Option<BatchReport>> {
        let started_at = Utc::now();
        let Some(batch) = read_day(path, date, &self.parser, &self.hours)? else {
            info!(date = %date, "Skipping day without feed file");
            return Ok(None);
        };
        self.report(&batch, run_id, started_at, sink).map(Some)
    }

    fn report(
        &mut self,
        batch: &DayBatch,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        sink: &mut dyn SignalSink,
    ) -> Result<BatchReport> {
        let patients = self.aggregate(
            PersonCategory::Patient,
            batch.records.get(PersonCategory::Patient),
            sink,
        )?;
        let providers = self.aggregate(
            PersonCategory::Provider,
            batch.records.get(PersonCategory::Provider),
            sink,
        )?;

        Ok(BatchReport {
            run_id,
            date: batch.date,
            counters: batch.counters.clone(),
            patient_entities: patients.entities,
            provider_entities: providers.entities,
            windows_emitted: patients.windows + providers.windows,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
