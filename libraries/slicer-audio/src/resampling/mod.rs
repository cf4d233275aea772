//! Sample rate conversion
//!
//! Converts the decoded stream to the configured output rate before the
//! dynamics and metering stages. When input and output rates match, samples
//! pass through untouched.
//!
//! Input is buffered until a complete rubato chunk is available, so callers
//! can push blocks of any size. Call [`Resampler::flush`] at end of stream to
//! retrieve the buffered tail.
//!
//! ## Example
//!
//! ```rust
//! use slicer_audio::resampling::{Resampler, ResamplingQuality};
//!
//! // 44.1kHz -> 48kHz, mono
//! let mut resampler = Resampler::new(44100, 48000, 1, ResamplingQuality::Balanced).unwrap();
//!
//! let input = vec![0.0; 4096];
//! let mut output = resampler.process(&input).unwrap();
//! output.extend(resampler.flush().unwrap());
//! ```

mod rubato_backend;

use thiserror::Error;

pub use rubato_backend::RubatoResampler;

/// Resampling errors
#[derive(Error, Debug)]
pub enum ResamplingError {
    #[error("Invalid sample rate: {0} Hz (must be > 0 and < 1MHz)")]
    InvalidSampleRate(u32),

    #[error("Invalid channel count: {0} (must be 1-8)")]
    InvalidChannelCount(usize),

    #[error("Resampler initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

pub type Result<T> = std::result::Result<T, ResamplingError>;

/// Resampling quality presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResamplingQuality {
    /// Polynomial interpolation, lowest CPU
    Fast,

    /// Sinc interpolation, cubic, 128 taps
    #[default]
    Balanced,

    /// Sinc interpolation, cubic, 256 taps
    High,
}

/// Trait for resampler implementations
pub trait ResamplerImpl: Send {
    /// Process interleaved audio samples, returning whatever output is ready
    fn process(&mut self, input: &[f32]) -> Result<Vec<f32>>;

    /// Drain everything still buffered
    fn flush(&mut self) -> Result<Vec<f32>>;

    /// Reset internal state
    fn reset(&mut self);
}

/// Rates match: hand samples straight through
struct Passthrough;

impl ResamplerImpl for Passthrough {
    fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        Ok(input.to_vec())
    }

    fn flush(&mut self) -> Result<Vec<f32>> {
        Ok(Vec::new())
    }

    fn reset(&mut self) {}
}

/// High-level resampler interface
pub struct Resampler {
    backend: Box<dyn ResamplerImpl>,
    input_rate: u32,
    output_rate: u32,
    channels: usize,
}

impl Resampler {
    /// Create a new resampler
    ///
    /// # Arguments
    /// - `input_rate`: Input sample rate (Hz)
    /// - `output_rate`: Output sample rate (Hz)
    /// - `channels`: Number of channels (1-8)
    /// - `quality`: Quality preset
    pub fn new(
        input_rate: u32,
        output_rate: u32,
        channels: usize,
        quality: ResamplingQuality,
    ) -> Result<Self> {
        if input_rate == 0 || input_rate > 1_000_000 {
            return Err(ResamplingError::InvalidSampleRate(input_rate));
        }
        if output_rate == 0 || output_rate > 1_000_000 {
            return Err(ResamplingError::InvalidSampleRate(output_rate));
        }
        if channels == 0 || channels > 8 {
            return Err(ResamplingError::InvalidChannelCount(channels));
        }

        let backend: Box<dyn ResamplerImpl> = if input_rate == output_rate {
            Box::new(Passthrough)
        } else {
            tracing::debug!(input_rate, output_rate, ?quality, "Resampling enabled");
            Box::new(RubatoResampler::new(
                input_rate,
                output_rate,
                channels,
                quality,
            )?)
        };

        Ok(Self {
            backend,
            input_rate,
            output_rate,
            channels,
        })
    }

    /// Process interleaved audio samples
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() % self.channels != 0 {
            return Err(ResamplingError::ProcessingFailed(format!(
                "Input buffer size {} is not a multiple of channel count {}",
                input.len(),
                self.channels
            )));
        }
        self.backend.process(input)
    }

    /// Retrieve the buffered tail at end of stream
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        self.backend.flush()
    }

    /// Get input sample rate
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Get output sample rate
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Get channel count
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// True when rates match and no conversion happens
    pub fn is_passthrough(&self) -> bool {
        self.input_rate == self.output_rate
    }

    /// Reset internal state
    pub fn reset(&mut self) {
        self.backend.reset();
    }
}
