/// WAV encoder over a swappable sink
use crate::error::{AudioError, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::{BufWriter, Seek, Write};

/// Sample encoding written to the WAV data chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleEncoding {
    /// IEEE float, 32 bits
    #[default]
    Float32,
    /// Signed PCM, 16 bits (clipped to full scale)
    Int16,
}

impl SampleEncoding {
    fn spec(self, channels: u16, sample_rate: u32) -> WavSpec {
        match self {
            Self::Float32 => WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            },
            Self::Int16 => WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
        }
    }
}

enum EncoderState<W: Write + Seek> {
    /// No sink attached
    Null,
    /// Header written, accepting samples
    Running {
        writer: WavWriter<BufWriter<W>>,
        frames: u64,
    },
}

/// WAV encoder that can be detached from one sink and attached to another
///
/// ```text
///   Null ──attach(sink)──► Running ──drain()──► Null
/// ```
///
/// `drain` finalizes the header sizes and closes the sink, so every drained
/// file is a complete WAV on its own.
pub struct WavEncoder<W: Write + Seek> {
    spec: WavSpec,
    encoding: SampleEncoding,
    state: EncoderState<W>,
}

impl<W: Write + Seek> WavEncoder<W> {
    /// Create an encoder in the Null state
    pub fn new(channels: u16, sample_rate: u32, encoding: SampleEncoding) -> Self {
        Self {
            spec: encoding.spec(channels, sample_rate),
            encoding,
            state: EncoderState::Null,
        }
    }

    /// Channel count written to each file
    pub fn channels(&self) -> u16 {
        self.spec.channels
    }

    /// Sample rate written to each file
    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    /// True between `attach` and `drain`
    pub fn is_running(&self) -> bool {
        matches!(self.state, EncoderState::Running { .. })
    }

    /// Frames written to the current sink
    pub fn frames_written(&self) -> u64 {
        match &self.state {
            EncoderState::Running { frames, .. } => *frames,
            EncoderState::Null => 0,
        }
    }

    /// Attach a sink and write the WAV header
    pub fn attach(&mut self, sink: W) -> Result<()> {
        if self.is_running() {
            return Err(AudioError::EncoderAlreadyRunning);
        }

        let writer = WavWriter::new(BufWriter::new(sink), self.spec)?;
        self.state = EncoderState::Running { writer, frames: 0 };
        Ok(())
    }

    /// Append interleaved samples to the current sink
    pub fn write(&mut self, samples: &[f32]) -> Result<()> {
        let channels = usize::from(self.spec.channels);
        if samples.len() % channels != 0 {
            return Err(AudioError::InvalidBuffer(format!(
                "{} samples is not a multiple of {} channels",
                samples.len(),
                channels
            )));
        }

        let EncoderState::Running { writer, frames } = &mut self.state else {
            return Err(AudioError::EncoderNotRunning);
        };

        match self.encoding {
            SampleEncoding::Float32 => {
                for &sample in samples {
                    writer.write_sample(sample)?;
                }
            }
            SampleEncoding::Int16 => {
                for &sample in samples {
                    let scaled = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
                    writer.write_sample(scaled)?;
                }
            }
        }

        *frames += (samples.len() / channels) as u64;
        Ok(())
    }

    /// Finalize the current file and return to Null
    ///
    /// Returns the number of frames the file holds. The sink is dropped.
    pub fn drain(&mut self) -> Result<u64> {
        match std::mem::replace(&mut self.state, EncoderState::Null) {
            EncoderState::Running { writer, frames } => {
                writer.finalize()?;
                Ok(frames)
            }
            EncoderState::Null => Err(AudioError::EncoderNotRunning),
        }
    }
}
