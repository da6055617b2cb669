//! Validated ping records.

use crate::ingest::codes::{PersonCategory, ProviderCategory, RoomCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fields decoded from the tag token. Which variant applies is decided once,
/// from the token length, before any field is read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TagDetails {
    Patient {
        /// Contact serial number of the visit the tag was issued for
        csn: u64,
        /// Issue time, minute resolution
        issued: DateTime<Utc>,
    },
    Provider {
        category: ProviderCategory,
        /// Staff identifier
        umid: u64,
        /// First instant of the issue month
        issued: DateTime<Utc>,
    },
}

/// One validated ping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingRecord {
    /// Feed-assigned ping id
    pub ping: u64,
    /// Room of the reporting antenna
    pub room: RoomCode,
    /// Physical tag id
    pub tag_id: u64,
    pub tag: TagDetails,
    /// Detection time
    pub timestamp: DateTime<Utc>,
    /// Raw signal strength
    pub signal: f32,
    /// Number of reads folded into this ping
    pub reads: u16,
}

impl PingRecord {
    pub fn category(&self) -> PersonCategory {
        match self.tag {
            TagDetails::Patient { .. } => PersonCategory::Patient,
            TagDetails::Provider { .. } => PersonCategory::Provider,
        }
    }

    /// Contact serial number; 0 for providers.
    pub fn csn(&self) -> u64 {
        match self.tag {
            TagDetails::Patient { csn, .. } => csn,
            TagDetails::Provider { .. } => 0,
        }
    }

    /// Staff identifier; 0 for patients.
    pub fn umid(&self) -> u64 {
        match self.tag {
            TagDetails::Patient { .. } => 0,
            TagDetails::Provider { umid, .. } => umid,
        }
    }

    pub fn provider_category(&self) -> Option<ProviderCategory> {
        match self.tag {
            TagDetails::Patient { .. } => None,
            TagDetails::Provider { category, .. } => Some(category),
        }
    }

    pub fn tag_issued(&self) -> DateTime<Utc> {
        match self.tag {
            TagDetails::Patient { issued, .. } | TagDetails::Provider { issued, .. } => issued,
        }
    }

    /// The identifier records are grouped by: the visit for patients,
    /// the staff member for providers.
    pub fn entity_id(&self) -> u64 {
        match self.tag {
            TagDetails::Patient { csn, .. } => csn,
            TagDetails::Provider { umid, .. } => umid,
        }
    }
}
