//! Core aggregation.
//!
//! This module contains:
//! - Ordering of a day's records into per-entity runs
//! - Sliding-anchor minute windows over each run
//! - Exp-weighted, top-K room signal vectors per window
//! - The day pipeline tying them together

pub mod grouping;
pub mod pipeline;
pub mod record;
pub mod signals;
pub mod windowing;

pub use grouping::{check_sorted, entity_runs, sort_by_entity, Partitioned};
pub use pipeline::{DayPipeline, PartitionStats};
pub use record::SignalRecord;
pub use signals::{AggregationSettings, SignalAggregator, SignalVector};
pub use windowing::{minute_windows, MinuteWindow};
