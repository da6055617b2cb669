//! Ordering a day's records into per-entity runs.
//!
//! The windower scans one entity's pings in time order, so before anything is
//! aggregated each category's records are sorted by entity id, then by
//! detection time. Equal keys keep their feed order.

use crate::error::{PipelineError, Result};
use crate::ingest::codes::PersonCategory;
use crate::ingest::types::PingRecord;

/// A day's kept records split by who carried the tag.
#[derive(Debug, Clone, Default)]
pub struct Partitioned {
    pub patients: Vec<PingRecord>,
    pub providers: Vec<PingRecord>,
}

impl Partitioned {
    pub fn push(&mut self, record: PingRecord) {
        match record.category() {
            PersonCategory::Patient => self.patients.push(record),
            PersonCategory::Provider => self.providers.push(record),
        }
    }

    /// Sort both partitions by `(entity, timestamp)`.
    pub fn sort(&mut self) {
        sort_by_entity(&mut self.patients);
        sort_by_entity(&mut self.providers);
    }

    pub fn get(&self, category: PersonCategory) -> &[PingRecord] {
        match category {
            PersonCategory::Patient => &self.patients,
            PersonCategory::Provider => &self.providers,
        }
    }

    pub fn len(&self) -> usize {
        self.patients.len() + self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty() && self.providers.is_empty()
    }
}

impl FromIterator<PingRecord> for Partitioned {
    fn from_iter<I: IntoIterator<Item = PingRecord>>(iter: I) -> Self {
        let mut partitioned = Partitioned::default();
        for record in iter {
            partitioned.push(record);
        }
        partitioned.sort();
        partitioned
    }
}

/// Stable sort by entity id, then detection time.
pub fn sort_by_entity(records: &mut [PingRecord]) {
    records.sort_by(|a, b| {
        a.entity_id()
            .cmp(&b.entity_id())
            .then(a.timestamp.cmp(&b.timestamp))
    });
}

/// Confirm every record belongs to `category` and the slice is sorted as
/// [`sort_by_entity`] leaves it.
pub fn check_sorted(records: &[PingRecord], category: PersonCategory) -> Result<()> {
    for (index, record) in records.iter().enumerate() {
        if record.category() != category {
            return Err(PipelineError::CategoryMismatch {
                expected: category.label(),
                found: record.category().label(),
            });
        }
        if index == 0 {
            continue;
        }
        let prev = &records[index - 1];
        let ordered = (prev.entity_id(), prev.timestamp) <= (record.entity_id(), record.timestamp);
        if !ordered {
            return Err(PipelineError::Unsorted {
                category: category.label(),
                index,
            });
        }
    }
    Ok(())
}

/// Iterator over maximal runs of records sharing an entity id.
pub struct EntityRuns<'a> {
    remaining: &'a [PingRecord],
}

impl<'a> Iterator for EntityRuns<'a> {
    type Item = &'a [PingRecord];

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.remaining.first()?;
        let id = first.entity_id();
        let end = self
            .remaining
            .iter()
            .position(|r| r.entity_id() != id)
            .unwrap_or(self.remaining.len());
        let (run, rest) = self.remaining.split_at(end);
        self.remaining = rest;
        Some(run)
    }
}

/// Split sorted records into per-entity runs.
pub fn entity_runs(records: &[PingRecord]) -> EntityRuns<'_> {
    EntityRuns { remaining: records }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ingest::codes::{ProviderCategory, RoomCode};
    use crate::ingest::types::TagDetails;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    pub(crate) fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 3, 5, 10, 0, 0).unwrap()
    }

    pub(crate) fn patient(csn: u64, offset_secs: i64, room: RoomCode, signal: f32) -> PingRecord {
        PingRecord {
            ping: 0,
            room,
            tag_id: 1000 + csn,
            tag: TagDetails::Patient {
                csn,
                issued: base_time(),
            },
            timestamp: base_time() + Duration::seconds(offset_secs),
            signal,
            reads: 1,
        }
    }

    pub(crate) fn provider(umid: u64, offset_secs: i64, room: RoomCode, signal: f32) -> PingRecord {
        PingRecord {
            ping: 0,
            room,
            tag_id: 2000 + umid,
            tag: TagDetails::Provider {
                category: ProviderCategory::Technician,
                umid,
                issued: base_time(),
            },
            timestamp: base_time() + Duration::seconds(offset_secs),
            signal,
            reads: 1,
        }
    }

    #[test]
    fn test_partition_and_sort() {
        let mut records = vec![
            patient(7, 30, RoomCode::Exam1, 1.0),
            provider(3, 10, RoomCode::Admin, 1.0),
            patient(5, 20, RoomCode::Exam2, 1.0),
            patient(7, 0, RoomCode::Exam3, 1.0),
        ];
        for (i, r) in records.iter_mut().enumerate() {
            r.ping = i as u64;
        }
        let partitioned: Partitioned = records.into_iter().collect();

        assert_eq!(partitioned.len(), 4);
        assert_eq!(partitioned.providers.len(), 1);
        let order: Vec<u64> = partitioned.patients.iter().map(|r| r.ping).collect();
        assert_eq!(order, vec![2, 3, 0]);
        assert!(check_sorted(&partitioned.patients, PersonCategory::Patient).is_ok());
        assert!(check_sorted(&partitioned.providers, PersonCategory::Provider).is_ok());
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let mut records: Vec<PingRecord> = (0..5)
            .map(|i| {
                let mut r = patient(1, 0, RoomCode::Exam1, i as f32);
                r.ping = i;
                r
            })
            .collect();
        records.reverse();
        sort_by_entity(&mut records);
        let order: Vec<u64> = records.iter().map(|r| r.ping).collect();
        assert_eq!(order, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_check_sorted_rejects_disorder() {
        let records = vec![
            patient(1, 30, RoomCode::Exam1, 1.0),
            patient(1, 10, RoomCode::Exam1, 1.0),
        ];
        assert!(matches!(
            check_sorted(&records, PersonCategory::Patient),
            Err(PipelineError::Unsorted { index: 1, .. })
        ));

        let records = vec![
            patient(2, 0, RoomCode::Exam1, 1.0),
            patient(1, 10, RoomCode::Exam1, 1.0),
        ];
        assert!(check_sorted(&records, PersonCategory::Patient).is_err());
    }

    #[test]
    fn test_check_sorted_rejects_wrong_category() {
        let records = vec![provider(1, 0, RoomCode::Exam1, 1.0)];
        assert!(matches!(
            check_sorted(&records, PersonCategory::Patient),
            Err(PipelineError::CategoryMismatch { .. })
        ));
    }

    #[test]
    fn test_entity_runs() {
        let records = vec![
            patient(1, 0, RoomCode::Exam1, 1.0),
            patient(1, 5, RoomCode::Exam1, 1.0),
            patient(4, 0, RoomCode::Exam1, 1.0),
            patient(9, 0, RoomCode::Exam1, 1.0),
            patient(9, 1, RoomCode::Exam1, 1.0),
        ];
        let sizes: Vec<(u64, usize)> = entity_runs(&records)
            .map(|run| (run[0].entity_id(), run.len()))
            .collect();
        assert_eq!(sizes, vec![(1, 2), (4, 1), (9, 2)]);
        assert_eq!(entity_runs(&[]).count(), 0);
    }
}
