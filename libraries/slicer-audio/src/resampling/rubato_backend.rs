//! Rubato resampler backend
//!
//! Fast, portable resampling using the rubato crate.

use super::{ResamplerImpl, ResamplingError, ResamplingQuality, Result};
use rubato::{
    FastFixedIn, PolynomialDegree, Resampler as RubatoResamplerTrait, SincFixedIn,
    SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::collections::VecDeque;

/// Chunk size in input frames handed to rubato per call
const CHUNK_SIZE: usize = 1024;

/// Enum to hold different rubato resampler types
enum RubatoResamplerType {
    Fast(FastFixedIn<f32>),
    Sinc(SincFixedIn<f32>),
}

/// Rubato-based resampler implementation
pub struct RubatoResampler {
    resampler: RubatoResamplerType,
    channels: usize,
    ratio: f64,
    /// Buffer for accumulating input samples when they don't fill a complete chunk
    input_buffer: VecDeque<f32>,
    /// Input frames accepted so far
    frames_in: u64,
    /// Output frames produced so far
    frames_out: u64,
}

impl RubatoResampler {
    /// Create a new rubato resampler
    pub fn new(
        input_rate: u32,
        output_rate: u32,
        channels: usize,
        quality: ResamplingQuality,
    ) -> Result<Self> {
        let ratio = f64::from(output_rate) / f64::from(input_rate);

        let resampler = match quality {
            ResamplingQuality::Fast => RubatoResamplerType::Fast(
                FastFixedIn::new(ratio, 1.0, PolynomialDegree::Cubic, CHUNK_SIZE, channels)
                    .map_err(|e| {
                        ResamplingError::InitializationFailed(format!(
                            "FastFixedIn creation failed: {}",
                            e
                        ))
                    })?,
            ),
            _ => RubatoResamplerType::Sinc(
                SincFixedIn::<f32>::new(
                    ratio,
                    1.0,
                    Self::quality_to_params(quality),
                    CHUNK_SIZE,
                    channels,
                )
                .map_err(|e| {
                    ResamplingError::InitializationFailed(format!(
                        "SincFixedIn creation failed: {}",
                        e
                    ))
                })?,
            ),
        };

        Ok(Self {
            resampler,
            channels,
            ratio,
            input_buffer: VecDeque::new(),
            frames_in: 0,
            frames_out: 0,
        })
    }

    /// Convert quality preset to rubato parameters
    fn quality_to_params(quality: ResamplingQuality) -> SincInterpolationParameters {
        match quality {
            ResamplingQuality::Fast | ResamplingQuality::Balanced => SincInterpolationParameters {
                sinc_len: 128,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Cubic,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris,
            },
            ResamplingQuality::High => SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.99,
                interpolation: SincInterpolationType::Cubic,
                oversampling_factor: 512,
                window: WindowFunction::BlackmanHarris,
            },
        }
    }

    /// Get expected input frame count for the next process call
    fn input_frames_next(&self) -> usize {
        match &self.resampler {
            RubatoResamplerType::Fast(r) => r.input_frames_next(),
            RubatoResamplerType::Sinc(r) => r.input_frames_next(),
        }
    }

    /// Output frames the whole stream should produce, given the input so far
    fn expected_total_out(&self) -> u64 {
        (self.frames_in as f64 * self.ratio).ceil() as u64
    }

    /// Deinterleave samples from [L, R, L, R, ...] to [[L, L, ...], [R, R, ...]]
    fn deinterleave(&self, interleaved: &[f32]) -> Vec<Vec<f32>> {
        let frames = interleaved.len() / self.channels;
        let mut channels = vec![Vec::with_capacity(frames); self.channels];

        for frame in interleaved.chunks_exact(self.channels) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }

        channels
    }

    /// Interleave at most `max_frames` frames from per-channel vectors
    fn interleave(&self, channels: &[Vec<f32>], max_frames: usize) -> Vec<f32> {
        let frames = channels.first().map_or(0, |c| c.len()).min(max_frames);
        let mut interleaved = Vec::with_capacity(frames * self.channels);

        for frame_idx in 0..frames {
            for channel in channels {
                interleaved.push(channel[frame_idx]);
            }
        }

        interleaved
    }

    fn process_chunk(&mut self, chunk: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        let result = match &mut self.resampler {
            RubatoResamplerType::Fast(r) => r.process(chunk, None),
            RubatoResamplerType::Sinc(r) => r.process(chunk, None),
        };
        result.map_err(|e| ResamplingError::ProcessingFailed(format!("Resampling failed: {}", e)))
    }

    fn process_partial(&mut self, chunk: Option<&[Vec<f32>]>) -> Result<Vec<Vec<f32>>> {
        let result = match &mut self.resampler {
            RubatoResamplerType::Fast(r) => r.process_partial(chunk, None),
            RubatoResamplerType::Sinc(r) => r.process_partial(chunk, None),
        };
        result.map_err(|e| ResamplingError::ProcessingFailed(format!("Flush failed: {}", e)))
    }
}

impl ResamplerImpl for RubatoResampler {
    fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        self.input_buffer.extend(input.iter().copied());
        self.frames_in += (input.len() / self.channels) as u64;

        let mut output = Vec::new();

        // Only hand rubato exactly the frame count it asks for
        loop {
            let needed_frames = self.input_frames_next();
            let needed_samples = needed_frames * self.channels;

            if self.input_buffer.len() < needed_samples {
                break;
            }

            let chunk: Vec<f32> = self.input_buffer.drain(..needed_samples).collect();
            let input_channels = self.deinterleave(&chunk);
            let output_channels = self.process_chunk(&input_channels)?;

            let produced = output_channels.first().map_or(0, |c| c.len());
            output.extend(self.interleave(&output_channels, produced));
            self.frames_out += produced as u64;
        }

        Ok(output)
    }

    /// Push the buffered remainder through, then drain the filter delay
    ///
    /// Output is capped at `ceil(frames_in * ratio)` so the zero padding
    /// rubato adds to a partial chunk does not lengthen the stream.
    fn flush(&mut self) -> Result<Vec<f32>> {
        let remaining: Vec<f32> = self.input_buffer.drain(..).collect();
        let mut pending = if remaining.is_empty() {
            None
        } else {
            Some(self.deinterleave(&remaining))
        };

        let expected = self.expected_total_out();
        let mut output = Vec::new();

        while self.frames_out < expected {
            let output_channels = self.process_partial(pending.as_deref())?;
            pending = None;

            let produced = output_channels.first().map_or(0, |c| c.len());
            if produced == 0 {
                break;
            }

            let wanted = (expected - self.frames_out) as usize;
            let take = produced.min(wanted);
            output.extend(self.interleave(&output_channels, take));
            self.frames_out += take as u64;
        }

        Ok(output)
    }

    fn reset(&mut self) {
        self.input_buffer.clear();
        self.frames_in = 0;
        self.frames_out = 0;

        match &mut self.resampler {
            RubatoResamplerType::Fast(r) => r.reset(),
            RubatoResamplerType::Sinc(r) => r.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deinterleave_interleave() {
        let resampler = RubatoResampler::new(44100, 48000, 2, ResamplingQuality::Fast).unwrap();

        // Test data: [L0, R0, L1, R1, ...]
        let interleaved = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        let deinterleaved = resampler.deinterleave(&interleaved);
        assert_eq!(deinterleaved.len(), 2);
        assert_eq!(deinterleaved[0], vec![1.0, 3.0, 5.0]); // Left channel
        assert_eq!(deinterleaved[1], vec![2.0, 4.0, 6.0]); // Right channel

        let reinterleaved = resampler.interleave(&deinterleaved, 3);
        assert_eq!(reinterleaved, interleaved);
    }

    #[test]
    fn test_process_empty() {
        let mut resampler = RubatoResampler::new(44100, 96000, 2, ResamplingQuality::Fast).unwrap();
        let output = resampler.process(&[]).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_flush_yields_expected_length() {
        for quality in [ResamplingQuality::Fast, ResamplingQuality::Balanced] {
            let mut resampler = RubatoResampler::new(44100, 48000, 1, quality).unwrap();

            let input = vec![0.1f32; 10_000];
            let mut output = Vec::new();
            for block in input.chunks(700) {
                output.extend(resampler.process(block).unwrap());
            }
            output.extend(resampler.flush().unwrap());

            let expected = (10_000f64 * 48000.0 / 44100.0).ceil() as usize;
            assert_eq!(output.len(), expected, "{:?}", quality);
        }
    }

    #[test]
    fn test_reset_clears_counters() {
        let mut resampler = RubatoResampler::new(48000, 16000, 1, ResamplingQuality::Fast).unwrap();
        resampler.process(&[0.0; 500]).unwrap();
        resampler.reset();
        assert!(resampler.flush().unwrap().is_empty());
    }
}
