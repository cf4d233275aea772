/// Audio-specific errors
use crate::resampling::ResamplingError;
use thiserror::Error;

/// Result type alias using `AudioError`
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio error types
#[derive(Error, Debug)]
pub enum AudioError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Decoding error
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Invalid audio buffer
    #[error("Invalid audio buffer: {0}")]
    InvalidBuffer(String),

    /// Invalid channel layout for a conversion
    #[error("Invalid channel conversion: {input} -> {output}")]
    InvalidChannels { input: u16, output: u16 },

    /// Encoder has no sink attached
    #[error("Encoder is not running")]
    EncoderNotRunning,

    /// Encoder already has a sink attached
    #[error("Encoder is already running")]
    EncoderAlreadyRunning,

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Symphonia error
    #[error("Symphonia error: {0}")]
    Symphonia(String),

    /// WAV writer error
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Resampling error
    #[error(transparent)]
    Resampling(#[from] ResamplingError),
}

impl From<AudioError> for slicer_core::SlicerError {
    fn from(err: AudioError) -> Self {
        slicer_core::SlicerError::audio(err.to_string())
    }
}
