//! Batch accounting: what was read, kept, and rejected, and why.

pub mod counters;
pub mod report;

pub use counters::ValidationCounters;
pub use report::{BatchReport, RunSummary};
