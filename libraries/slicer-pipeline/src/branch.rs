//! Encoder + sink segment downstream of the suspend point

use crate::error::{PipelineError, Result};
use crate::sink::SinkHandle;
use slicer_audio::{SampleEncoding, WavEncoder};

/// Callback run once the drain marker has passed through the encoder
///
/// Runs on the streaming thread with the branch quiesced (no sink attached)
/// and receives the slice that was just closed.
pub type DrainCallback = Box<dyn FnOnce(&mut OutputBranch, &DrainedSlice) -> Result<()> + Send>;

/// The slice closed by a drain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainedSlice {
    /// Sequence number of the closed sink
    pub sequence: u64,
    /// Location of the closed sink
    pub location: String,
    /// Frames flushed to it
    pub frames: u64,
}

struct Attached {
    sequence: u64,
    location: String,
}

/// The output half of the pipeline: a WAV encoder feeding the current sink
pub struct OutputBranch {
    encoder: WavEncoder<SinkHandle>,
    attached: Option<Attached>,
    on_drain: Option<DrainCallback>,
    frames_total: u64,
}

impl OutputBranch {
    /// Create a branch with no sink attached
    pub fn new(channels: u16, sample_rate: u32, encoding: SampleEncoding) -> Self {
        Self {
            encoder: WavEncoder::new(channels, sample_rate, encoding),
            attached: None,
            on_drain: None,
            frames_total: 0,
        }
    }

    /// Attach a sink and start the encoder on it
    pub fn attach(&mut self, sink: SinkHandle) -> Result<()> {
        let attached = Attached {
            sequence: sink.sequence(),
            location: sink.location().to_string(),
        };
        self.encoder.attach(sink)?;
        tracing::info!(sequence = attached.sequence, location = %attached.location, "Slice opened");
        self.attached = Some(attached);
        Ok(())
    }

    /// Encode interleaved samples into the current sink
    pub fn push(&mut self, samples: &[f32]) -> Result<()> {
        self.encoder.write(samples)?;
        self.frames_total += (samples.len() / usize::from(self.encoder.channels())) as u64;
        Ok(())
    }

    /// Register the callback the next drain completes with
    pub fn on_drain_complete(&mut self, callback: DrainCallback) {
        self.on_drain = Some(callback);
    }

    /// Flush and close the current sink, then run the drain callback
    pub fn send_drain(&mut self) -> Result<DrainedSlice> {
        let attached = self
            .attached
            .take()
            .ok_or(PipelineError::Audio(slicer_audio::AudioError::EncoderNotRunning))?;
        let frames = self.encoder.drain()?;

        let drained = DrainedSlice {
            sequence: attached.sequence,
            location: attached.location,
            frames,
        };
        tracing::info!(
            sequence = drained.sequence,
            location = %drained.location,
            frames,
            "Slice closed"
        );

        if let Some(callback) = self.on_drain.take() {
            callback(self, &drained)?;
        }
        Ok(drained)
    }

    /// True while a sink is attached
    pub fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    /// Sequence number of the attached sink
    pub fn current_sequence(&self) -> Option<u64> {
        self.attached.as_ref().map(|a| a.sequence)
    }

    /// Frames written to the current sink
    pub fn frames_in_slice(&self) -> u64 {
        self.encoder.frames_written()
    }

    /// Frames pushed across every slice
    pub fn frames_total(&self) -> u64 {
        self.frames_total
    }

    /// Output channel count
    pub fn channels(&self) -> u16 {
        self.encoder.channels()
    }

    /// Output sample rate
    pub fn sample_rate(&self) -> u32 {
        self.encoder.sample_rate()
    }
}
