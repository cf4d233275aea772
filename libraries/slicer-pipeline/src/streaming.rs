//! Streaming thread
//!
//! Pulls blocks from the source and pushes them through every stage on one
//! dedicated thread. Level reports are posted to the bus as they complete;
//! cut hooks armed by the control thread run here, inside the suspend point.
//!
//! ## Architecture
//!
//! ```text
//! Streaming Thread                                           Control Thread
//!        │                                                         │
//!        │ source ─► mix ─► resample ─► dynamics ─► meter          │
//!        │                                            │            │
//!        │                         BusMessage::Level  └───────────>│ heuristic
//!        │                                                         │
//!        │<───────────────────────────── request_cut (arms hook) ──│
//!        │                                                         │
//!        │ suspend point: hook runs, drain + swap                  │
//!        │ encoder ─► sink                                         │
//!        │                                                         │
//!        │ BusMessage::Eos / Error ───────────────────────────────>│
//! ```

use crate::branch::OutputBranch;
use crate::controller::PipelineController;
use crate::error::{PipelineError, Result};
use crate::state::SliceRecord;
use crossbeam_channel::Sender;
use slicer_audio::effects::EffectChain;
use slicer_audio::{AudioError, ChannelMixer, Resampler};
use slicer_core::{AudioSource, LoudnessReport};
use slicer_loudness::LevelMeter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Capacity of the bus between the streaming and control threads
pub const BUS_CAPACITY: usize = 256;

/// Message posted by the streaming thread
#[derive(Debug)]
pub enum BusMessage {
    /// A completed metering interval
    Level(LoudnessReport),
    /// Input exhausted (or stop requested) and the final slice closed
    Eos,
    /// The streaming thread stopped on an error
    Error(PipelineError),
}

/// Every stage the streaming thread owns
pub(crate) struct StreamingTask {
    pub source: Box<dyn AudioSource>,
    pub mixer: ChannelMixer,
    pub resampler: Resampler,
    pub effects: EffectChain,
    pub meter: LevelMeter,
    pub branch: OutputBranch,
    pub controller: PipelineController,
    pub block_frames: usize,
    pub stop: Arc<AtomicBool>,
    pub bus: Sender<BusMessage>,
}

impl StreamingTask {
    /// Spawn the task on its own thread
    ///
    /// The outcome is posted to the bus: [`BusMessage::Eos`] after the final
    /// slice is closed, or [`BusMessage::Error`].
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("slicer-streaming".to_string())
            .spawn(move || self.run_and_report())?;
        Ok(handle)
    }

    fn run_and_report(mut self) {
        let message = match self.run() {
            Ok(last) => {
                if let Some(record) = last {
                    tracing::debug!(sequence = record.sequence, "Final slice recorded");
                }
                BusMessage::Eos
            }
            Err(e) => {
                tracing::error!(error = %e, "Streaming thread stopped");
                BusMessage::Error(e)
            }
        };
        // Receiver gone means the control loop already returned
        let _ = self.bus.send(message);
    }

    fn run(&mut self) -> Result<Option<SliceRecord>> {
        tracing::debug!(
            input_channels = self.mixer.input_channels(),
            output_channels = self.mixer.output_channels(),
            input_rate = self.resampler.input_rate(),
            output_rate = self.resampler.output_rate(),
            effects = ?self.effects.names(),
            "Streaming started"
        );

        self.controller.open_first_slice(&mut self.branch)?;

        while !self.stop.load(Ordering::Relaxed) {
            let Some(block) = self.source.read_block(self.block_frames)? else {
                break;
            };
            let mixed = self.mixer.process(&block.samples)?;
            let resampled = self.resampler.process(&mixed).map_err(AudioError::from)?;
            self.forward(resampled)?;
        }

        if self.stop.load(Ordering::Relaxed) {
            tracing::info!("Stop requested, closing final slice");
        }

        let tail = self.resampler.flush().map_err(AudioError::from)?;
        self.forward(tail)?;

        let end_time = self.meter.position();
        let last = self.controller.close_final_slice(&mut self.branch, end_time)?;
        tracing::debug!(frames = self.branch.frames_total(), %end_time, "Streaming finished");
        Ok(last)
    }

    fn forward(&mut self, mut samples: Vec<f32>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        self.effects.process(
            &mut samples,
            usize::from(self.branch.channels()),
            self.branch.sample_rate(),
        );

        for report in self.meter.process(&samples)? {
            self.bus
                .send(BusMessage::Level(report))
                .map_err(|_| PipelineError::Disconnected)?;
        }

        self.controller.suspend_point().pass(&samples, &mut self.branch)
    }
}
