/// Core error types for the slicer
use thiserror::Error;

/// Result type alias using `SlicerError`
pub type Result<T> = std::result::Result<T, SlicerError>;

/// Core error type shared across crates
#[derive(Error, Debug)]
pub enum SlicerError {
    /// Audio decoding/processing/encoding errors
    #[error("Audio error: {0}")]
    Audio(String),

    /// Loudness measurement errors
    #[error("Loudness error: {0}")]
    Loudness(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SlicerError {
    /// Create an audio error
    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio(msg.into())
    }

    /// Create a loudness error
    pub fn loudness(msg: impl Into<String>) -> Self {
        Self::Loudness(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
