/// Loudness report contract between the level meter and the slice heuristic
use super::clock::ClockTime;
use serde::{Deserialize, Serialize};

/// Levels measured on one channel over one interval, all in dBFS
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelLevel {
    /// RMS level over the interval
    pub rms_db: f64,
    /// Highest sample magnitude in the interval
    pub peak_db: f64,
    /// Decaying peak (held, then falling off)
    pub decay_db: f64,
}

impl ChannelLevel {
    /// Create a channel level triple
    pub fn new(rms_db: f64, peak_db: f64, decay_db: f64) -> Self {
        Self {
            rms_db,
            peak_db,
            decay_db,
        }
    }

    /// RMS converted back to a linear value in [0.0, 1.0]
    pub fn normalized_rms(&self) -> f64 {
        10f64.powf(self.rms_db / 20.0)
    }
}

/// Periodic measurement emitted by the metering stage
///
/// `end_time` marks the end of the measurement window in stream time.
/// Reports for one stream carry the same number of channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoudnessReport {
    /// End of the measurement window
    pub end_time: ClockTime,
    /// Per-channel levels, in channel order
    pub channels: Vec<ChannelLevel>,
}

impl LoudnessReport {
    /// Create a report
    pub fn new(end_time: ClockTime, channels: Vec<ChannelLevel>) -> Self {
        Self { end_time, channels }
    }

    /// Number of channels carried by this report
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
