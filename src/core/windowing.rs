//! Sliding-anchor minute windows over one entity's pings.
//!
//! A window opens at its first ping (the anchor) and takes every following
//! ping whose elapsed time since the anchor is under a whole minute. The first
//! ping at or past that mark anchors the next window. Windows therefore do not
//! line up with clock minutes; the label is the anchor truncated to the minute.

use crate::ingest::types::PingRecord;
use chrono::{DateTime, Duration, Utc};

/// A run of consecutive pings of one entity within a minute of the anchor.
///
/// Only [`MinuteWindows`] builds these, and it never yields an empty window,
/// so `records` always holds at least the anchor.
#[derive(Debug, Clone, Copy)]
pub struct MinuteWindow<'a> {
    label: DateTime<Utc>,
    records: &'a [PingRecord],
}

impl<'a> MinuteWindow<'a> {
    /// Anchor timestamp truncated to the minute.
    pub fn label(&self) -> DateTime<Utc> {
        self.label
    }

    /// The pings, anchor first. Never empty.
    pub fn records(&self) -> &'a [PingRecord] {
        self.records
    }

    pub fn anchor(&self) -> &'a PingRecord {
        &self.records[0]
    }

    /// Time of the last ping in the window.
    pub fn end(&self) -> DateTime<Utc> {
        self.records[self.records.len() - 1].timestamp
    }

    /// Real time covered, from the anchor to the last ping.
    pub fn span(&self) -> Duration {
        self.end() - self.anchor().timestamp
    }

    pub fn ping_count(&self) -> usize {
        self.records.len()
    }
}

/// Iterator yielding [`MinuteWindow`]s in time order.
///
/// Input must be one entity's records sorted by timestamp.
pub struct MinuteWindows<'a> {
    remaining: &'a [PingRecord],
}

impl<'a> Iterator for MinuteWindows<'a> {
    type Item = MinuteWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let anchor = self.remaining.first()?.timestamp;
        let end = self
            .remaining
            .iter()
            .position(|r| (r.timestamp - anchor).num_minutes() > 0)
            .unwrap_or(self.remaining.len());
        let (records, rest) = self.remaining.split_at(end);
        self.remaining = rest;
        Some(MinuteWindow {
            label: truncate_to_minute(anchor),
            records,
        })
    }
}

/// Partition one entity's time-ordered run into minute windows.
pub fn minute_windows(run: &[PingRecord]) -> MinuteWindows<'_> {
    MinuteWindows { remaining: run }
}

/// Round an instant down to the start of its minute.
pub fn truncate_to_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    let secs = t.timestamp().div_euclid(60) * 60;
    DateTime::from_timestamp(secs, 0).unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grouping::tests::{base_time, patient};
    use crate::ingest::codes::RoomCode;
    use chrono::{TimeZone, Timelike};

    fn run(offsets: &[i64]) -> Vec<PingRecord> {
        offsets
            .iter()
            .map(|&s| patient(1, s, RoomCode::Exam1, -40.0))
            .collect()
    }

    fn sizes(records: &[PingRecord]) -> Vec<usize> {
        minute_windows(records).map(|w| w.ping_count()).collect()
    }

    #[test]
    fn test_anchor_rule() {
        // 10:00:00, 10:00:30, 10:01:05
        let records = run(&[0, 30, 65]);
        let windows: Vec<MinuteWindow> = minute_windows(&records).collect();

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].ping_count(), 2);
        assert_eq!(windows[0].label(), base_time());
        assert_eq!(windows[1].ping_count(), 1);
        assert_eq!(windows[1].label(), base_time() + Duration::minutes(1));
    }

    #[test]
    fn test_single_record() {
        let records = run(&[12]);
        let windows: Vec<MinuteWindow> = minute_windows(&records).collect();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].label(), base_time());
        assert_eq!(windows[0].span(), Duration::zero());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(minute_windows(&[]).count(), 0);
    }

    #[test]
    fn test_every_window_holds_its_anchor() {
        let records = run(&[0, 5, 61, 200, 201, 202, 400]);
        let mut seen = 0;
        for window in minute_windows(&records) {
            let pings = window.records();
            assert!(!pings.is_empty());
            assert_eq!(pings[0].timestamp, window.anchor().timestamp);
            assert_eq!(pings[0].timestamp, records[seen].timestamp);
            assert_eq!(window.end(), pings[pings.len() - 1].timestamp);
            assert_eq!(window.label(), truncate_to_minute(window.anchor().timestamp));
            seen += pings.len();
        }
        assert_eq!(seen, records.len());
    }

    #[test]
    fn test_windows_slide_with_anchor() {
        // Anchor at :50 keeps :50 + 59s = 1:49 in the same window even
        // though it crosses a clock minute.
        let records = run(&[50, 109, 110, 169, 170]);
        assert_eq!(sizes(&records), vec![2, 2, 1]);

        let labels: Vec<u32> = minute_windows(&records)
            .map(|w| w.label().minute())
            .collect();
        assert_eq!(labels, vec![0, 1, 2]);
    }

    #[test]
    fn test_exactly_sixty_seconds_starts_new_window() {
        let records = run(&[0, 59, 60]);
        assert_eq!(sizes(&records), vec![2, 1]);
    }

    #[test]
    fn test_sub_second_precision() {
        let mut records = run(&[0, 59]);
        records[1].timestamp += Duration::milliseconds(999);
        assert_eq!(sizes(&records), vec![2]);
    }

    #[test]
    fn test_truncate_to_minute() {
        let t = Utc.with_ymd_and_hms(2018, 3, 5, 10, 7, 59).unwrap() + Duration::milliseconds(750);
        assert_eq!(
            truncate_to_minute(t),
            Utc.with_ymd_and_hms(2018, 3, 5, 10, 7, 0).unwrap()
        );
    }
}
