//! Peak tracking with hysteresis.
//!
//! A `PeakTracker` decides for one metric whether the latest reading is worth
//! persisting. It emits once when the metric enters an over-threshold episode
//! and again only for each strictly higher peak inside that episode. Dropping
//! below the threshold ends the episode and forgets the peak.

use crate::model::MetricKind;
use serde::Serialize;

/// Outcome of feeding one reading into a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    None,
    Emit,
}

/// Per-metric hysteresis state.
///
/// `highest_recorded` only carries meaning while `armed` is true and is 0.0
/// whenever the tracker is idle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PeakState {
    pub armed: bool,
    pub highest_recorded: f64,
}

/// Hysteresis state machine for a single metric.
#[derive(Debug, Clone)]
pub struct PeakTracker {
    kind: MetricKind,
    state: PeakState,
}

impl PeakTracker {
    pub fn new(kind: MetricKind) -> Self {
        Self {
            kind,
            state: PeakState::default(),
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn state(&self) -> PeakState {
        self.state
    }

    /// True while the metric is inside an over-threshold episode.
    pub fn is_elevated(&self) -> bool {
        self.state.armed
    }

    /// Feeds the latest reading and returns whether an event must be emitted.
    pub fn observe(&mut self, current_percent: f64, threshold: f64) -> Decision {
        // NaN fails this comparison and is treated as below threshold.
        let over_threshold = current_percent >= threshold;
        if !over_threshold {
            self.state = PeakState::default();
            return Decision::None;
        }

        if !self.state.armed || current_percent > self.state.highest_recorded {
            self.state.armed = true;
            self.state.highest_recorded = current_percent;
            return Decision::Emit;
        }

        Decision::None
    }
}
