//! Reduction of a minute window to a per-room signal vector.
//!
//! Each ping is weighted `exp(signal / scale)`, so a stronger detection
//! counts for more. Only the heaviest `max_pings` pings of a window are kept,
//! and their weights are summed by room.

use crate::core::windowing::MinuteWindow;
use crate::ingest::codes::RoomCode;
use serde::{Deserialize, Serialize};

/// At most two useful pings per second over a minute.
pub const DEFAULT_MAX_PINGS: usize = 120;

/// Divisor applied to the raw signal before exponentiation.
pub const DEFAULT_SIGNAL_SCALE: f64 = 10.0;

/// Summed ping weight per room, indexed by [`RoomCode::ordinal`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalVector(pub [f64; RoomCode::COUNT]);

impl SignalVector {
    pub fn get(&self, room: RoomCode) -> f64 {
        self.0[room.ordinal()]
    }

    pub fn add(&mut self, room: RoomCode, weight: f64) {
        self.0[room.ordinal()] += weight;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Room with the largest mass; the lowest ordinal wins ties.
    pub fn strongest_room(&self) -> Option<RoomCode> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &mass) in self.0.iter().enumerate() {
            if mass > 0.0 && best.map_or(true, |(_, m)| mass > m) {
                best = Some((i, mass));
            }
        }
        best.and_then(|(i, _)| RoomCode::from_ordinal(i))
    }
}

/// Aggregation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregationSettings {
    /// Pings kept per window, heaviest first
    pub max_pings: usize,
    /// Weight is `exp(signal / signal_scale)`
    pub signal_scale: f64,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            max_pings: DEFAULT_MAX_PINGS,
            signal_scale: DEFAULT_SIGNAL_SCALE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WeightedPing {
    room: RoomCode,
    weight: f64,
}

/// Turns windows into [`SignalVector`]s.
///
/// Holds a scratch buffer reused across the windows of one sequential pass;
/// each parallel unit of work owns its own aggregator.
pub struct SignalAggregator {
    settings: AggregationSettings,
    scratch: Vec<WeightedPing>,
}

impl SignalAggregator {
    pub fn new(settings: AggregationSettings) -> Self {
        Self {
            settings,
            scratch: Vec::with_capacity(settings.max_pings * 2),
        }
    }

    pub fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    /// Reduce a window to its signal vector.
    ///
    /// Pings are ranked by weight, heaviest first. Equal weights keep window
    /// order, so on a tie at the cut-off the earlier ping is kept.
    pub fn aggregate(&mut self, window: &MinuteWindow<'_>) -> SignalVector {
        let scale = self.settings.signal_scale;
        self.scratch.clear();
        self.scratch
            .extend(window.records().iter().map(|r| WeightedPing {
                room: r.room,
                weight: (f64::from(r.signal) / scale).exp(),
            }));

        self.scratch.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        self.scratch.truncate(self.settings.max_pings);

        let mut signals = SignalVector::default();
        for ping in &self.scratch {
            signals.add(ping.room, ping.weight);
        }
        signals
    }
}

impl Default for SignalAggregator {
    fn default() -> Self {
        Self::new(AggregationSettings::default())
    }
}
