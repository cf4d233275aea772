//! Error types for level metering

use std::time::Duration;
use thiserror::Error;

/// Result type for metering operations
pub type Result<T> = std::result::Result<T, LoudnessError>;

/// Errors that can occur while metering
#[derive(Error, Debug)]
pub enum LoudnessError {
    /// Invalid sample rate
    #[error("Invalid sample rate: {0} Hz (must be between 1 and 1000000)")]
    InvalidSampleRate(u32),

    /// Invalid channel count
    #[error("Invalid channel count: {0} (must be 1-8)")]
    InvalidChannelCount(u32),

    /// Interval shorter than one frame
    #[error("Invalid metering interval: {0:?} is shorter than one frame")]
    InvalidInterval(Duration),

    /// Buffer does not hold whole frames
    #[error("Sample count {samples} is not divisible by channel count {channels}")]
    MisalignedBuffer { samples: usize, channels: usize },
}

impl From<LoudnessError> for slicer_core::SlicerError {
    fn from(err: LoudnessError) -> Self {
        slicer_core::SlicerError::loudness(err.to_string())
    }
}
