//! Dynamics processing
//!
//! Trait-based effect chain applied to the stream before metering. All
//! effects operate in place on interleaved f32 samples.
//!
//! Available effects:
//! - **Compressor**: soft-knee compressor with linked detection across channels
//! - **Gain**: fixed gain in dB

mod chain;
mod compressor;
mod gain;

pub use chain::{AudioEffect, EffectChain};
pub use compressor::{Compressor, CompressorSettings};
pub use gain::{Gain, DEFAULT_GAIN_DB};

#[cfg(test)]
mod tests {
    /// Generate an interleaved sine wave for testing
    pub(crate) fn generate_sine(
        freq: f32,
        sample_rate: u32,
        duration_secs: f32,
        amplitude: f32,
        channels: usize,
    ) -> Vec<f32> {
        let num_samples = (sample_rate as f32 * duration_secs) as usize;
        let mut samples = Vec::with_capacity(num_samples * channels);

        for i in 0..num_samples {
            let t = i as f32 / sample_rate as f32;
            let sample = amplitude * (2.0 * std::f32::consts::PI * freq * t).sin();
            for _ in 0..channels {
                samples.push(sample);
            }
        }

        samples
    }

    pub(crate) fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }
}
