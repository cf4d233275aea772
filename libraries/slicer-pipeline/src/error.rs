//! Error types for the slicing pipeline

use crate::state::SlicePhase;
use slicer_audio::AudioError;
use slicer_core::SlicerError;
use slicer_loudness::LoudnessError;
use thiserror::Error;

/// Pipeline errors
///
/// [`PipelineError::is_fatal`] splits these into errors absorbed where they
/// are detected and errors that shut the pipeline down.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Loudness report cannot be evaluated (no channels, NaN level, wrong width)
    #[error("Malformed loudness report: {0}")]
    MalformedReport(String),

    /// A cut is already in flight; the request was dropped
    #[error("Cut request ignored: slice controller is {phase}")]
    ConcurrentCutIgnored { phase: SlicePhase },

    /// Output destination could not be created
    #[error("Cannot create slice sink {location}: {source}")]
    SinkCreationFailed {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// Drain or re-attachment failed mid-swap; the suspend point stays blocked
    #[error("Sink swap failed after slice {sequence}: {reason}")]
    SinkSwapFailed { sequence: u64, reason: String },

    /// A hook is already armed or running on the suspend point
    #[error("Suspend point already holds a hook")]
    SuspendPointBusy,

    /// Data reached a suspend point whose hook failed
    #[error("Suspend point is failed; data flow halted")]
    SuspendPointFailed,

    /// Decode, conversion or encoding error
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// Metering error
    #[error(transparent)]
    Loudness(#[from] LoudnessError),

    /// Source read error
    #[error(transparent)]
    Source(#[from] SlicerError),

    /// The other end of the message bus went away
    #[error("Message bus disconnected")]
    Disconnected,

    /// Configuration rejected at startup
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Thread spawn failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// True for errors that must tear the pipeline down
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::MalformedReport(_) | Self::ConcurrentCutIgnored { .. }
        )
    }

    /// True for failures to produce or attach an output sink
    pub fn is_sink_failure(&self) -> bool {
        matches!(
            self,
            Self::SinkCreationFailed { .. } | Self::SinkSwapFailed { .. }
        )
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
