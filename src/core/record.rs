//! Output records: one per entity per minute window.

use crate::core::signals::SignalVector;
use crate::core::windowing::MinuteWindow;
use crate::ingest::codes::{PersonCategory, RoomCode};
use crate::visits::VisitWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated room signal of one entity over one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub category: PersonCategory,
    /// Physical tag of the window's anchor ping
    pub tag_id: u64,
    /// Visit contact serial number; 0 for providers
    pub csn: u64,
    /// Staff identifier; 0 for patients
    pub umid: u64,
    /// Window label, truncated to the minute
    pub minute: DateTime<Utc>,
    /// Pings that fell in the window, before the top-K cut
    pub pings: u32,
    /// Room with the most signal mass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<RoomCode>,
    pub signals: SignalVector,
    /// Scheduled visit, when enrichment found one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit: Option<VisitWindow>,
}

impl SignalRecord {
    /// Build a record from a window and its aggregated vector.
    pub fn from_window(
        window: &MinuteWindow<'_>,
        signals: SignalVector,
        visit: Option<VisitWindow>,
    ) -> Self {
        let anchor = window.anchor();
        Self {
            category: anchor.category(),
            tag_id: anchor.tag_id,
            csn: anchor.csn(),
            umid: anchor.umid(),
            minute: window.label(),
            pings: u32::try_from(window.ping_count()).unwrap_or(u32::MAX),
            location: signals.strongest_room(),
            signals,
            visit,
        }
    }

    /// The grouping identifier: CSN for patients, UMid for providers.
    pub fn entity_id(&self) -> u64 {
        match self.category {
            PersonCategory::Patient => self.csn,
            PersonCategory::Provider => self.umid,
        }
    }
}
