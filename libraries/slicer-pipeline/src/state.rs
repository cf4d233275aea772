//! Slice state owned by the controller

use serde::Serialize;
use slicer_core::ClockTime;
use std::fmt;

/// Phase of the cut state machine
///
/// ```text
/// Idle ──request_cut──► CutRequested ──hook fires──► Draining
///  ▲                                                    │
///  └───────────── attach new sink ◄── Swapping ◄────────┘
///                                  drain complete
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SlicePhase {
    /// No cut in flight
    #[default]
    Idle,
    /// Hook armed, waiting for the next buffer at the suspend point
    CutRequested,
    /// Drain marker sent to the encoder
    Draining,
    /// Old sink closed, new sink being attached
    Swapping,
}

impl fmt::Display for SlicePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::CutRequested => "cut-requested",
            Self::Draining => "draining",
            Self::Swapping => "swapping",
        };
        f.write_str(name)
    }
}

/// Snapshot of the controller's slice bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SliceState {
    /// Sequence number of the open slice; bumped once per completed swap
    pub sequence_number: u64,
    /// Stream time the open slice started at
    pub slice_start_time: ClockTime,
    /// Current phase
    pub phase: SlicePhase,
}

/// A finished slice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SliceRecord {
    /// Sequence number the slice was written under
    pub sequence: u64,
    /// Where the slice was written
    pub location: String,
    /// Frames in the slice
    pub frames: u64,
    /// Stream time the slice started at
    pub start_time: ClockTime,
    /// Stream time of the report that ended it, or end of stream for the last
    pub end_time: ClockTime,
}

impl SliceRecord {
    /// Stream time covered between start and end
    pub fn duration(&self) -> std::time::Duration {
        self.end_time.saturating_since(self.start_time)
    }
}
