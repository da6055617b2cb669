//! Raw row parsing and validation.
//!
//! A raw row has six text fields: ping id, sensor id, tag token, detection
//! timestamp, signal strength and read count. Each check below either passes
//! or rejects the whole row with exactly one [`Rejection`]; no partially
//! filled record ever leaves this module.

use crate::audit::ValidationCounters;
use crate::ingest::codes::{ProviderCategory, SensorTable};
use crate::ingest::types::{PingRecord, TagDetails};
use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of fields in a raw row.
pub const RAW_FIELD_COUNT: usize = 6;

/// Tag token length for provider badges.
pub const PROVIDER_TAG_LEN: usize = 24;

/// Tag token length for patient badges.
pub const PATIENT_TAG_LEN: usize = 32;

const TAG_DELIMITER: char = 'F';
const TAG_PARTS: usize = 5;

/// Why a raw row was dropped. One counter per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rejection {
    WrongFieldCount,
    InvalidPing,
    #[serde(rename = "InvalidIP")]
    InvalidIp,
    InvalidTagLength,
    InvalidProviderTag,
    InvalidProviderTagId,
    InvalidProviderType,
    #[serde(rename = "InvalidUMid")]
    InvalidUmid,
    InvalidTagIssueDate,
    InvalidPatientTag,
    InvalidPatientTagId,
    InconsistentTag,
    #[serde(rename = "InvalidPatientCSN")]
    InvalidPatientCsn,
    InvalidPatientDate,
    #[serde(rename = "InvalidTimeStamp")]
    InvalidTimestamp,
    InvalidSignal,
    InvalidReadCount,
}

impl Rejection {
    pub const ALL: [Rejection; 17] = [
        Rejection::WrongFieldCount,
        Rejection::InvalidPing,
        Rejection::InvalidIp,
        Rejection::InvalidTagLength,
        Rejection::InvalidProviderTag,
        Rejection::InvalidProviderTagId,
        Rejection::InvalidProviderType,
        Rejection::InvalidUmid,
        Rejection::InvalidTagIssueDate,
        Rejection::InvalidPatientTag,
        Rejection::InvalidPatientTagId,
        Rejection::InconsistentTag,
        Rejection::InvalidPatientCsn,
        Rejection::InvalidPatientDate,
        Rejection::InvalidTimestamp,
        Rejection::InvalidSignal,
        Rejection::InvalidReadCount,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Rejection::WrongFieldCount => "WrongFieldCount",
            Rejection::InvalidPing => "InvalidPing",
            Rejection::InvalidIp => "InvalidIP",
            Rejection::InvalidTagLength => "InvalidTagLength",
            Rejection::InvalidProviderTag => "InvalidProviderTag",
            Rejection::InvalidProviderTagId => "InvalidProviderTagId",
            Rejection::InvalidProviderType => "InvalidProviderType",
            Rejection::InvalidUmid => "InvalidUMid",
            Rejection::InvalidTagIssueDate => "InvalidTagIssueDate",
            Rejection::InvalidPatientTag => "InvalidPatientTag",
            Rejection::InvalidPatientTagId => "InvalidPatientTagId",
            Rejection::InconsistentTag => "InconsistentTag",
            Rejection::InvalidPatientCsn => "InvalidPatientCSN",
            Rejection::InvalidPatientDate => "InvalidPatientDate",
            Rejection::InvalidTimestamp => "InvalidTimeStamp",
            Rejection::InvalidSignal => "InvalidSignal",
            Rejection::InvalidReadCount => "InvalidReadCount",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a well-formed row falls outside the analysed clinic hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exclusion {
    TimeEarly,
    TimeLate,
}

/// Clinic opening hours in UTC, as `[open_hour, close_hour)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    pub open_hour: u32,
    pub close_hour: u32,
}

impl Default for OperatingHours {
    fn default() -> Self {
        Self {
            open_hour: 7,
            close_hour: 20,
        }
    }
}

impl OperatingHours {
    pub fn check(&self, timestamp: DateTime<Utc>) -> Result<(), Exclusion> {
        let hour = timestamp.hour();
        if hour < self.open_hour {
            Err(Exclusion::TimeEarly)
        } else if hour >= self.close_hour {
            Err(Exclusion::TimeLate)
        } else {
            Ok(())
        }
    }
}

/// Turns raw rows into [`PingRecord`]s.
#[derive(Debug, Clone, Copy)]
pub struct RecordParser<'a> {
    sensors: &'a SensorTable,
}

impl<'a> RecordParser<'a> {
    pub fn new(sensors: &'a SensorTable) -> Self {
        Self { sensors }
    }

    /// Validate one raw row.
    pub fn parse(&self, fields: &[&str]) -> Result<PingRecord, Rejection> {
        if fields.len() != RAW_FIELD_COUNT {
            return Err(Rejection::WrongFieldCount);
        }

        let ping = parse_unsigned(fields[0]).ok_or(Rejection::InvalidPing)?;
        let room = self.sensors.lookup(fields[1]).ok_or(Rejection::InvalidIp)?;

        let token = fields[2];
        let (tag_id, tag) = match token.len() {
            PROVIDER_TAG_LEN => parse_provider_tag(token)?,
            PATIENT_TAG_LEN => parse_patient_tag(token)?,
            _ => return Err(Rejection::InvalidTagLength),
        };

        let timestamp = parse_detection_time(fields[3]).ok_or(Rejection::InvalidTimestamp)?;
        let signal = parse_signal(fields[4]).ok_or(Rejection::InvalidSignal)?;
        let reads = fields[5]
            .parse::<u16>()
            .map_err(|_| Rejection::InvalidReadCount)?;

        Ok(PingRecord {
            ping,
            room,
            tag_id,
            tag,
            timestamp,
            signal,
            reads,
        })
    }

    /// Parse a row and apply the opening-hours filter, tallying the outcome.
    ///
    /// Every call counts toward `total_records`; only rows returned as
    /// `Some` count toward `final_records`.
    pub fn screen(
        &self,
        fields: &[&str],
        hours: &OperatingHours,
        counters: &mut ValidationCounters,
    ) -> Option<PingRecord> {
        counters.record_row();
        let record = match self.parse(fields) {
            Ok(record) => record,
            Err(rejection) => {
                counters.record_rejection(rejection);
                return None;
            }
        };
        if let Err(exclusion) = hours.check(record.timestamp) {
            counters.record_exclusion(exclusion);
            return None;
        }
        counters.record_accepted();
        Some(record)
    }
}

/// `tagId F providerType F umid F MMYY F trailing`
fn parse_provider_tag(token: &str) -> Result<(u64, TagDetails), Rejection> {
    let parts: Vec<&str> = token.split(TAG_DELIMITER).collect();
    if parts.len() != TAG_PARTS {
        return Err(Rejection::InvalidProviderTag);
    }

    let tag_id = parse_unsigned(parts[0]).ok_or(Rejection::InvalidProviderTagId)?;
    let category = parts[1]
        .parse::<i64>()
        .map(ProviderCategory::from_code)
        .map_err(|_| Rejection::InvalidProviderType)?;
    let umid = parse_unsigned(parts[2]).ok_or(Rejection::InvalidUmid)?;
    let issued = parse_issue_month(parts[3]).ok_or(Rejection::InvalidTagIssueDate)?;

    Ok((
        tag_id,
        TagDetails::Provider {
            category,
            umid,
            issued,
        },
    ))
}

/// `tagId F 0 F csn F MMDDYYHHMM F trailing`
fn parse_patient_tag(token: &str) -> Result<(u64, TagDetails), Rejection> {
    let parts: Vec<&str> = token.split(TAG_DELIMITER).collect();
    if parts.len() != TAG_PARTS {
        return Err(Rejection::InvalidPatientTag);
    }

    let tag_id = parse_unsigned(parts[0]).ok_or(Rejection::InvalidPatientTagId)?;
    if parts[1] != "0" {
        return Err(Rejection::InconsistentTag);
    }
    let csn = parse_unsigned(parts[2]).ok_or(Rejection::InvalidPatientCsn)?;
    let issued = parse_issue_minute(parts[3]).ok_or(Rejection::InvalidPatientDate)?;

    Ok((tag_id, TagDetails::Patient { csn, issued }))
}

/// `MMYY`, issued on the first of the month at midnight.
fn parse_issue_month(field: &str) -> Option<DateTime<Utc>> {
    if field.len() != 4 {
        return None;
    }
    let month = two_digits(field, 0)?;
    let year = 2000 + two_digits(field, 2)?;
    issue_instant(year, month, 1, 0, 0)
}

/// `MMDDYYHHMM`.
fn parse_issue_minute(field: &str) -> Option<DateTime<Utc>> {
    if field.len() != 10 {
        return None;
    }
    let month = two_digits(field, 0)?;
    let day = two_digits(field, 2)?;
    let year = 2000 + two_digits(field, 4)?;
    let hour = two_digits(field, 6)?;
    let minute = two_digits(field, 8)?;
    issue_instant(year, month, day, hour, minute)
}

/// Build an instant from calendar fields that may overflow their unit.
///
/// Out-of-range values carry into the next unit: month 13 is January of the
/// following year and January 32nd is February 1st.
fn issue_instant(
    year: i64,
    month: i64,
    day: i64,
    hour: i64,
    minute: i64,
) -> Option<DateTime<Utc>> {
    let months = month - 1;
    let year = i32::try_from(year + months.div_euclid(12)).ok()?;
    let month = u32::try_from(months.rem_euclid(12) + 1).ok()?;
    let first = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;
    let offset = Duration::days(day - 1) + Duration::hours(hour) + Duration::minutes(minute);
    first.checked_add_signed(offset)
}

/// A two-character integer sub-field; a leading sign is allowed.
fn two_digits(field: &str, at: usize) -> Option<i64> {
    field.get(at..at + 2)?.parse().ok()
}

/// Decimal digits only: no sign, no whitespace.
fn parse_unsigned(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// The feed writes `YYYY-MM-DD hh:mm:ss[.fff]`; the character at offset 10
/// separates date and time and is replaced to form an RFC 3339 UTC instant.
fn parse_detection_time(text: &str) -> Option<DateTime<Utc>> {
    const SEPARATOR_AT: usize = 10;
    let date = text.get(..SEPARATOR_AT)?;
    let time = text.get(SEPARATOR_AT + 1..)?;
    let rfc3339 = format!("{date}T{time}Z");
    DateTime::parse_from_rfc3339(&rfc3339)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn parse_signal(text: &str) -> Option<f32> {
    let value: f64 = text.parse().ok()?;
    let value = value as f32;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::codes::{PersonCategory, RoomCode};

    const PATIENT_TAG: &str = "12345678F0F123456789F0115241030F";
    const PROVIDER_TAG: &str = "123456F1F123456789F0124F";

    fn row<'a>(tag: &'a str, time: &'a str) -> [&'a str; 6] {
        ["17", "10.23.69.141", tag, time, "-45.5", "3"]
    }

    fn parse(fields: &[&str]) -> Result<PingRecord, Rejection> {
        let table = SensorTable::default();
        RecordParser::new(&table).parse(fields)
    }

    #[test]
    fn test_patient_tag() {
        let record = parse(&row(PATIENT_TAG, "2024-01-15 10:31:02")).unwrap();
        assert_eq!(record.ping, 17);
        assert_eq!(record.room, RoomCode::Exam2);
        assert_eq!(record.tag_id, 12345678);
        assert_eq!(record.category(), PersonCategory::Patient);
        assert_eq!(record.csn(), 123456789);
        assert_eq!(record.umid(), 0);
        assert_eq!(
            record.tag_issued(),
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
        );
        assert_eq!(
            record.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 31, 2).unwrap()
        );
        assert_eq!(record.signal, -45.5);
        assert_eq!(record.reads, 3);
    }

    #[test]
    fn test_provider_tag() {
        let record = parse(&row(PROVIDER_TAG, "2024-01-15 10:31:02")).unwrap();
        assert_eq!(record.tag_id, 123456);
        assert_eq!(record.category(), PersonCategory::Provider);
        assert_eq!(record.provider_category(), Some(ProviderCategory::Attending));
        assert_eq!(record.umid(), 123456789);
        assert_eq!(record.csn(), 0);
        assert_eq!(
            record.tag_issued(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_tag_length_dispatch() {
        let long = "1".repeat(33);
        for tag in ["", "123F1F2F0124F", "123456F1F123456789F0124FF0", long.as_str()] {
            assert_eq!(
                parse(&row(tag, "2024-01-15 10:31:02")),
                Err(Rejection::InvalidTagLength),
                "tag {tag:?}"
            );
        }
    }

    #[test]
    fn test_provider_rejections() {
        let cases = [
            ("123456F1F123456789F01245", Rejection::InvalidProviderTag),
            ("12x456F1F123456789F0124F", Rejection::InvalidProviderTagId),
            ("123456FxF123456789F0124F", Rejection::InvalidProviderType),
            ("123456F1F12345678xF0124F", Rejection::InvalidUmid),
            ("1234567F1F12345678F124F0", Rejection::InvalidTagIssueDate),
            ("123456F1F123456789F01x4F", Rejection::InvalidTagIssueDate),
            ("123456F1F123456789F 124F", Rejection::InvalidTagIssueDate),
        ];
        for (tag, expected) in cases {
            assert_eq!(tag.len(), PROVIDER_TAG_LEN, "{tag}");
            assert_eq!(parse(&row(tag, "2024-01-15 10:31:02")), Err(expected), "{tag}");
        }
    }

    #[test]
    fn test_patient_rejections() {
        let cases = [
            ("12345678F0F123456789F011524103012", Rejection::InvalidTagLength),
            ("12345678F0F123456789F01152410300", Rejection::InvalidPatientTag),
            ("1234567XF0F123456789F0115241030F", Rejection::InvalidPatientTagId),
            ("12345678F1F123456789F0115241030F", Rejection::InconsistentTag),
            ("12345678F0F12345678xF0115241030F", Rejection::InvalidPatientCsn),
            ("12345678F0F123456789F01152410x0F", Rejection::InvalidPatientDate),
            ("12345678F0F12345678F01152410301F", Rejection::InvalidPatientDate),
        ];
        for (tag, expected) in cases {
            assert_eq!(parse(&row(tag, "2024-01-15 10:31:02")), Err(expected), "{tag}");
        }
    }

    #[test]
    fn test_issue_dates_carry_overflow() {
        let issued = |tag: &str| parse(&row(tag, "2024-01-15 10:31:02")).unwrap().tag_issued();

        // Month 13 rolls into January of the next year.
        assert_eq!(
            issued("123456F1F123456789F1324F"),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
        // Month -1 is November of the previous year.
        assert_eq!(
            issued("123456F1F123456789F-124F"),
            Utc.with_ymd_and_hms(2023, 11, 1, 0, 0, 0).unwrap()
        );
        // January 32nd is February 1st.
        assert_eq!(
            issued("12345678F0F123456789F0132241030F"),
            Utc.with_ymd_and_hms(2024, 2, 1, 10, 30, 0).unwrap()
        );
        // Hour 24 and minute 60 carry into the next day and hour.
        assert_eq!(
            issued("12345678F0F123456789F0115242460F"),
            Utc.with_ymd_and_hms(2024, 1, 16, 1, 0, 0).unwrap()
        );
        assert_eq!(
            issued("12345678F0F123456789F+115241030F"),
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_field_rejections() {
        let ok = row(PATIENT_TAG, "2024-01-15 10:31:02");

        let mut fields = ok;
        fields[0] = "-1";
        assert_eq!(parse(&fields), Err(Rejection::InvalidPing));

        let mut fields = ok;
        fields[1] = "10.23.69.163";
        assert_eq!(parse(&fields), Err(Rejection::InvalidIp));

        for time in ["2024-01-15", "2024-01-15 25:31:02", "15/01/2024 10:31:02", ""] {
            let mut fields = ok;
            fields[3] = time;
            assert_eq!(parse(&fields), Err(Rejection::InvalidTimestamp), "{time}");
        }

        for signal in ["loud", "NaN", "inf", ""] {
            let mut fields = ok;
            fields[4] = signal;
            assert_eq!(parse(&fields), Err(Rejection::InvalidSignal), "{signal}");
        }

        for reads in ["-1", "70000", "two"] {
            let mut fields = ok;
            fields[5] = reads;
            assert_eq!(parse(&fields), Err(Rejection::InvalidReadCount), "{reads}");
        }

        assert_eq!(parse(&ok[..5]), Err(Rejection::WrongFieldCount));
    }

    #[test]
    fn test_fractional_seconds_and_t_separator() {
        let record = parse(&row(PATIENT_TAG, "2024-01-15T10:31:02.250")).unwrap();
        assert_eq!(record.timestamp.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_operating_hours() {
        let hours = OperatingHours::default();
        let at = |h, m| Utc.with_ymd_and_hms(2024, 1, 15, h, m, 0).unwrap();
        assert_eq!(hours.check(at(6, 59)), Err(Exclusion::TimeEarly));
        assert_eq!(hours.check(at(7, 0)), Ok(()));
        assert_eq!(hours.check(at(19, 59)), Ok(()));
        assert_eq!(hours.check(at(20, 0)), Err(Exclusion::TimeLate));
    }

    #[test]
    fn test_screen_counts_each_row_once() {
        let table = SensorTable::default();
        let parser = RecordParser::new(&table);
        let hours = OperatingHours::default();
        let mut counters = ValidationCounters::default();

        let rows = [
            row(PATIENT_TAG, "2024-01-15 10:31:02"),
            row(PATIENT_TAG, "2024-01-15 06:31:02"),
            row(PROVIDER_TAG, "2024-01-15 21:00:00"),
            row("short", "2024-01-15 10:31:02"),
        ];
        let kept: Vec<PingRecord> = rows
            .iter()
            .filter_map(|fields| parser.screen(fields, &hours, &mut counters))
            .collect();

        assert_eq!(kept.len(), 1);
        assert_eq!(counters.total_records, 4);
        assert_eq!(counters.final_records, 1);
        assert_eq!(counters.time_early, 1);
        assert_eq!(counters.time_late, 1);
        assert_eq!(counters.rejected(Rejection::InvalidTagLength), 1);
        assert!(counters.is_balanced());
    }
}
