/// Channel count conversion
use crate::error::{AudioError, Result};

/// Converts interleaved audio between channel counts
///
/// - N -> N: passthrough
/// - N -> 1: average of all channels
/// - 1 -> N: mono duplicated to every channel
/// - N -> M (M < N): output channel `j` averages input channels `j, j+M, ...`
/// - N -> M (M > N): output channel `j` copies input channel `j % N`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMixer {
    input: u16,
    output: u16,
}

impl ChannelMixer {
    /// Create a mixer from `input` to `output` channels
    pub fn new(input: u16, output: u16) -> Result<Self> {
        if input == 0 || output == 0 {
            return Err(AudioError::InvalidChannels { input, output });
        }
        Ok(Self { input, output })
    }

    /// Channel count going in
    pub fn input_channels(&self) -> u16 {
        self.input
    }

    /// Channel count coming out
    pub fn output_channels(&self) -> u16 {
        self.output
    }

    /// True when no conversion happens
    pub fn is_passthrough(&self) -> bool {
        self.input == self.output
    }

    /// Convert one interleaved block
    pub fn process(&self, samples: &[f32]) -> Result<Vec<f32>> {
        let input = usize::from(self.input);
        let output = usize::from(self.output);

        if samples.len() % input != 0 {
            return Err(AudioError::InvalidBuffer(format!(
                "{} samples is not a multiple of {} channels",
                samples.len(),
                input
            )));
        }

        if self.is_passthrough() {
            return Ok(samples.to_vec());
        }

        let frames = samples.len() / input;
        let mut out = Vec::with_capacity(frames * output);

        for frame in samples.chunks_exact(input) {
            if output < input {
                for j in 0..output {
                    let (sum, count) = frame
                        .iter()
                        .skip(j)
                        .step_by(output)
                        .fold((0.0f32, 0u32), |(sum, n), &s| (sum + s, n + 1));
                    out.push(sum / count as f32);
                }
            } else {
                for j in 0..output {
                    out.push(frame[j % input]);
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        let mixer = ChannelMixer::new(2, 2).unwrap();
        assert!(mixer.is_passthrough());
        assert_eq!(mixer.process(&[0.1, 0.2]).unwrap(), vec![0.1, 0.2]);
    }

    #[test]
    fn test_stereo_to_mono_averages() {
        let mixer = ChannelMixer::new(2, 1).unwrap();
        let out = mixer.process(&[1.0, 0.0, 0.5, -0.5]).unwrap();
        assert_eq!(out, vec![0.5, 0.0]);
    }

    #[test]
    fn test_surround_to_mono_averages_all() {
        let mixer = ChannelMixer::new(6, 1).unwrap();
        let out = mixer.process(&[0.6; 6]).unwrap();
        assert_eq!(out.len(), 1);
        assert!((out[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_mono_to_stereo_duplicates() {
        let mixer = ChannelMixer::new(1, 2).unwrap();
        let out = mixer.process(&[0.3, -0.7]).unwrap();
        assert_eq!(out, vec![0.3, 0.3, -0.7, -0.7]);
    }

    #[test]
    fn test_quad_to_stereo_pairs() {
        let mixer = ChannelMixer::new(4, 2).unwrap();
        // L, R, SL, SR
        let out = mixer.process(&[1.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(out, vec![0.5, 0.5]);
    }

    #[test]
    fn test_zero_channels_rejected() {
        assert!(matches!(
            ChannelMixer::new(0, 1),
            Err(AudioError::InvalidChannels { input: 0, output: 1 })
        ));
    }

    #[test]
    fn test_misaligned_block_rejected() {
        let mixer = ChannelMixer::new(2, 1).unwrap();
        assert!(mixer.process(&[0.0; 3]).is_err());
    }
}
