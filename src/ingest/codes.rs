//! Code tables for the deployment: rooms, sensors and person categories.
//!
//! `RoomCode` ordinals index every signal vector. New rooms are appended
//! after `NoSignal`; reordering would silently shift output columns.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;

/// Identifier a sensor uses when a tag was polled but not heard.
pub const NO_SIGNAL_SENSOR: &str = "NoSignal";

/// A physical antenna location, plus the "no signal" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoomCode {
    Exam1,
    Exam2,
    Exam3,
    Exam4,
    Exam5,
    Exam6,
    Exam7,
    Exam8,
    Exam9,
    Exam10,
    Exam11,
    Exam12,
    Field1,
    Field2,
    Field3,
    Field4,
    Field5,
    #[serde(rename = "IOLMaster")]
    IolMaster,
    Lensometer,
    Admin,
    Checkout,
    #[serde(rename = "IPW9")]
    Ipw9,
    #[serde(rename = "IPW2")]
    Ipw2,
    Treatment,
    NoSignal,
}

impl RoomCode {
    /// Every room in ordinal order.
    pub const ALL: [RoomCode; 25] = [
        RoomCode::Exam1,
        RoomCode::Exam2,
        RoomCode::Exam3,
        RoomCode::Exam4,
        RoomCode::Exam5,
        RoomCode::Exam6,
        RoomCode::Exam7,
        RoomCode::Exam8,
        RoomCode::Exam9,
        RoomCode::Exam10,
        RoomCode::Exam11,
        RoomCode::Exam12,
        RoomCode::Field1,
        RoomCode::Field2,
        RoomCode::Field3,
        RoomCode::Field4,
        RoomCode::Field5,
        RoomCode::IolMaster,
        RoomCode::Lensometer,
        RoomCode::Admin,
        RoomCode::Checkout,
        RoomCode::Ipw9,
        RoomCode::Ipw2,
        RoomCode::Treatment,
        RoomCode::NoSignal,
    ];

    /// Length of every signal vector.
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this room in a signal vector.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        Self::ALL.get(ordinal).copied()
    }

    /// Human-readable room name, used as the output column header.
    pub fn name(self) -> &'static str {
        match self {
            RoomCode::Exam1 => "Exam1",
            RoomCode::Exam2 => "Exam2",
            RoomCode::Exam3 => "Exam3",
            RoomCode::Exam4 => "Exam4",
            RoomCode::Exam5 => "Exam5",
            RoomCode::Exam6 => "Exam6",
            RoomCode::Exam7 => "Exam7",
            RoomCode::Exam8 => "Exam8",
            RoomCode::Exam9 => "Exam9",
            RoomCode::Exam10 => "Exam10",
            RoomCode::Exam11 => "Exam11",
            RoomCode::Exam12 => "Exam12",
            RoomCode::Field1 => "Field1",
            RoomCode::Field2 => "Field2",
            RoomCode::Field3 => "Field3",
            RoomCode::Field4 => "Field4",
            RoomCode::Field5 => "Field5",
            RoomCode::IolMaster => "IOLMaster",
            RoomCode::Lensometer => "Lensometer",
            RoomCode::Admin => "Admin",
            RoomCode::Checkout => "Checkout",
            RoomCode::Ipw9 => "IPW9",
            RoomCode::Ipw2 => "IPW2",
            RoomCode::Treatment => "Treatment",
            RoomCode::NoSignal => "NoSignal",
        }
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Who carries a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonCategory {
    Patient,
    Provider,
}

impl PersonCategory {
    pub fn label(self) -> &'static str {
        match self {
            PersonCategory::Patient => "patient",
            PersonCategory::Provider => "provider",
        }
    }
}

impl fmt::Display for PersonCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Staff role encoded in a provider tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCategory {
    Attending,
    Fellow,
    Resident,
    Technician,
    Assistant,
    Educator,
    Administrator,
    Clerk,
    Imaging,
    Other,
    /// A numeric code the tag printer emitted that is not in the roster.
    Unlisted(i64),
}

impl ProviderCategory {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => ProviderCategory::Attending,
            2 => ProviderCategory::Fellow,
            3 => ProviderCategory::Resident,
            4 => ProviderCategory::Technician,
            5 => ProviderCategory::Assistant,
            6 => ProviderCategory::Educator,
            7 => ProviderCategory::Administrator,
            8 => ProviderCategory::Clerk,
            9 => ProviderCategory::Imaging,
            99 => ProviderCategory::Other,
            other => ProviderCategory::Unlisted(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            ProviderCategory::Attending => 1,
            ProviderCategory::Fellow => 2,
            ProviderCategory::Resident => 3,
            ProviderCategory::Technician => 4,
            ProviderCategory::Assistant => 5,
            ProviderCategory::Educator => 6,
            ProviderCategory::Administrator => 7,
            ProviderCategory::Clerk => 8,
            ProviderCategory::Imaging => 9,
            ProviderCategory::Other => 99,
            ProviderCategory::Unlisted(code) => code,
        }
    }
}

/// Built-in antenna assignments for the clinic.
///
/// The Treatment antenna is registered as `10.23.69:163` in the deployment
/// inventory, so feed rows reporting `10.23.69.163` are rejected as unknown
/// sensors. See [`SensorTable::suspicious_entries`].
const DEFAULT_SENSORS: [(&str, RoomCode); 25] = [
    ("10.23.69.140", RoomCode::Exam1),
    ("10.23.69.141", RoomCode::Exam2),
    ("10.23.69.142", RoomCode::Exam3),
    ("10.23.69.143", RoomCode::Exam4),
    ("10.23.69.144", RoomCode::Exam5),
    ("10.23.69.145", RoomCode::Exam6),
    ("10.23.69.146", RoomCode::Exam7),
    ("10.23.69.147", RoomCode::Exam8),
    ("10.23.69.148", RoomCode::Exam9),
    ("10.23.69.149", RoomCode::Exam10),
    ("10.23.69.150", RoomCode::Exam11),
    ("10.23.69.151", RoomCode::Exam12),
    ("10.23.69.152", RoomCode::Field1),
    ("10.23.69.153", RoomCode::Field2),
    ("10.23.69.154", RoomCode::Field3),
    ("10.23.69.155", RoomCode::Field4),
    ("10.23.69.156", RoomCode::Field5),
    ("10.23.69.157", RoomCode::IolMaster),
    ("10.23.69.158", RoomCode::Lensometer),
    ("10.23.69.159", RoomCode::Admin),
    ("10.23.69.160", RoomCode::Checkout),
    ("10.23.69.161", RoomCode::Ipw9),
    ("10.23.69.162", RoomCode::Ipw2),
    ("10.23.69:163", RoomCode::Treatment),
    (NO_SIGNAL_SENSOR, RoomCode::NoSignal),
];

/// One row of a sensor table override file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorAssignment {
    pub sensor: String,
    pub room: RoomCode,
}

/// Mapping from the sensor identifier in the feed to a room.
#[derive(Debug, Clone)]
pub struct SensorTable {
    rooms: HashMap<String, RoomCode>,
}

impl Default for SensorTable {
    fn default() -> Self {
        Self::from_assignments(
            DEFAULT_SENSORS
                .iter()
                .map(|(sensor, room)| ((*sensor).to_string(), *room)),
        )
    }
}

impl SensorTable {
    pub fn from_assignments(assignments: impl IntoIterator<Item = (String, RoomCode)>) -> Self {
        Self {
            rooms: assignments.into_iter().collect(),
        }
    }

    /// Load a table from a JSON array of `{"sensor": ..., "room": ...}`.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let rows: Vec<SensorAssignment> =
            serde_json::from_str(&content).map_err(|e| PipelineError::json(path, e))?;
        if rows.is_empty() {
            return Err(PipelineError::SensorTable(format!(
                "{} contains no assignments",
                path.display()
            )));
        }

        let mut rooms = HashMap::with_capacity(rows.len());
        for row in rows {
            if let Some(previous) = rooms.insert(row.sensor.clone(), row.room) {
                return Err(PipelineError::SensorTable(format!(
                    "sensor {} assigned to both {} and {}",
                    row.sensor, previous, row.room
                )));
            }
        }
        Ok(Self { rooms })
    }

    pub fn lookup(&self, sensor: &str) -> Option<RoomCode> {
        self.rooms.get(sensor).copied()
    }

    /// Sensor identifiers assigned to a room, sorted.
    pub fn sensors_for(&self, room: RoomCode) -> Vec<&str> {
        let mut sensors: Vec<&str> = self
            .rooms
            .iter()
            .filter(|(_, r)| **r == room)
            .map(|(s, _)| s.as_str())
            .collect();
        sensors.sort_unstable();
        sensors
    }

    /// Identifiers that are neither a dotted-quad address nor the
    /// no-signal sentinel. Rows in the feed can never match these.
    pub fn suspicious_entries(&self) -> Vec<(&str, RoomCode)> {
        let mut entries: Vec<(&str, RoomCode)> = self
            .rooms
            .iter()
            .filter(|(sensor, _)| {
                sensor.as_str() != NO_SIGNAL_SENSOR && sensor.parse::<Ipv4Addr>().is_err()
            })
            .map(|(sensor, room)| (sensor.as_str(), *room))
            .collect();
        entries.sort_unstable();
        entries
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_ordinals_are_dense() {
        for (i, room) in RoomCode::ALL.iter().enumerate() {
            assert_eq!(room.ordinal(), i);
            assert_eq!(RoomCode::from_ordinal(i), Some(*room));
        }
        assert_eq!(RoomCode::COUNT, 25);
        assert_eq!(RoomCode::NoSignal.ordinal(), RoomCode::COUNT - 1);
        assert_eq!(RoomCode::from_ordinal(RoomCode::COUNT), None);
    }

    #[test]
    fn test_default_table_lookup() {
        let table = SensorTable::default();
        assert_eq!(table.lookup("10.23.69.140"), Some(RoomCode::Exam1));
        assert_eq!(table.lookup("10.23.69.162"), Some(RoomCode::Ipw2));
        assert_eq!(table.lookup("NoSignal"), Some(RoomCode::NoSignal));
        assert_eq!(table.lookup("10.23.69.199"), None);
        assert_eq!(table.len(), 25);
    }

    #[test]
    fn test_treatment_entry_is_flagged() {
        let table = SensorTable::default();
        assert_eq!(table.lookup("10.23.69.163"), None);
        assert_eq!(
            table.suspicious_entries(),
            vec![("10.23.69:163", RoomCode::Treatment)]
        );
    }

    #[test]
    fn test_provider_category_codes() {
        assert_eq!(ProviderCategory::from_code(1), ProviderCategory::Attending);
        assert_eq!(ProviderCategory::from_code(99), ProviderCategory::Other);
        assert_eq!(ProviderCategory::from_code(42), ProviderCategory::Unlisted(42));
        assert_eq!(ProviderCategory::Imaging.code(), 9);
    }

    #[test]
    fn test_room_serde_uses_display_names() {
        let json = serde_json::to_string(&RoomCode::IolMaster).unwrap();
        assert_eq!(json, "\"IOLMaster\"");
        let room: RoomCode = serde_json::from_str("\"IPW9\"").unwrap();
        assert_eq!(room, RoomCode::Ipw9);
    }

    #[test]
    fn test_load_json_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensors.json");
        std::fs::write(
            &path,
            r#"[{"sensor": "a", "room": "Exam1"}, {"sensor": "a", "room": "Exam2"}]"#,
        )
        .unwrap();
        assert!(matches!(
            SensorTable::load_json(&path),
            Err(PipelineError::SensorTable(_))
        ));

        std::fs::write(&path, r#"[{"sensor": "10.0.0.1", "room": "Treatment"}]"#).unwrap();
        let table = SensorTable::load_json(&path).unwrap();
        assert_eq!(table.lookup("10.0.0.1"), Some(RoomCode::Treatment));
        assert_eq!(table.sensors_for(RoomCode::Treatment), vec!["10.0.0.1"]);
    }
}
