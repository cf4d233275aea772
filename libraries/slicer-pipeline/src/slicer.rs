//! Pipeline assembly

use crate::branch::OutputBranch;
use crate::config::SlicerConfig;
use crate::control::{ControlLoop, RunSummary};
use crate::controller::PipelineController;
use crate::error::{PipelineError, Result};
use crate::sink::{FileSinkFactory, SinkFactory};
use crate::streaming::{BusMessage, StreamingTask, BUS_CAPACITY};
use crate::suspend::SuspendPoint;
use crossbeam_channel::bounded;
use slicer_audio::effects::EffectChain;
use slicer_audio::{AudioError, ChannelMixer, Resampler, ResamplingQuality, SampleEncoding};
use slicer_core::{AudioFormat, AudioSource, LoudnessReport};
use slicer_loudness::LevelMeter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Builder for a slicing run
pub struct Slicer {
    config: SlicerConfig,
    source: Box<dyn AudioSource>,
    factory: Option<Box<dyn SinkFactory>>,
    effects: EffectChain,
    output_channels: Option<u16>,
    output_rate: Option<u32>,
    encoding: SampleEncoding,
    quality: ResamplingQuality,
}

struct Stages {
    mixer: ChannelMixer,
    resampler: Resampler,
    meter: LevelMeter,
    output: AudioFormat,
}

impl Slicer {
    /// Slice `source` with `config`
    ///
    /// Without further setup the output keeps the source format, no effects
    /// are applied and slices are written as files named from
    /// `config.output_pattern`.
    pub fn new(config: SlicerConfig, source: Box<dyn AudioSource>) -> Self {
        Self {
            config,
            source,
            factory: None,
            effects: EffectChain::new(),
            output_channels: None,
            output_rate: None,
            encoding: SampleEncoding::default(),
            quality: ResamplingQuality::default(),
        }
    }

    /// Write slices through a custom factory instead of files
    pub fn with_sink_factory(mut self, factory: Box<dyn SinkFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Dynamics applied before metering
    pub fn with_effects(mut self, effects: EffectChain) -> Self {
        self.effects = effects;
        self
    }

    /// Convert to a channel count and/or sample rate; `None` keeps the
    /// source's
    pub fn with_output_format(mut self, channels: Option<u16>, sample_rate: Option<u32>) -> Self {
        self.output_channels = channels;
        self.output_rate = sample_rate;
        self
    }

    /// Sample encoding of the written WAV files
    pub fn with_encoding(mut self, encoding: SampleEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Resampler quality when the output rate differs from the source's
    pub fn with_resampling_quality(mut self, quality: ResamplingQuality) -> Self {
        self.quality = quality;
        self
    }

    fn build_stages(&self) -> Result<Stages> {
        self.config.validate()?;

        let input = self.source.format();
        if input.channels == 0 || input.sample_rate.as_hz() == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "source reports an unusable format: {} channels at {} Hz",
                input.channels,
                input.sample_rate.as_hz()
            )));
        }

        let channels = self.output_channels.unwrap_or(input.channels);
        let rate = self.output_rate.unwrap_or_else(|| input.sample_rate.as_hz());

        let mixer = ChannelMixer::new(input.channels, channels)?;
        let resampler = Resampler::new(
            input.sample_rate.as_hz(),
            rate,
            usize::from(channels),
            self.quality,
        )
        .map_err(AudioError::from)?;
        let output = AudioFormat::float32(rate, channels);
        let meter = LevelMeter::new(output, self.config.level.settings())?;

        Ok(Stages {
            mixer,
            resampler,
            meter,
            output,
        })
    }

    /// Start the streaming thread
    ///
    /// The first slice is opened on the streaming thread before any data
    /// flows; call [`SlicerHandle::wait`] to run the control loop.
    pub fn start(self) -> Result<SlicerHandle> {
        let stages = self.build_stages()?;
        let factory = match self.factory {
            Some(factory) => factory,
            None => Box::new(FileSinkFactory::new(self.config.output_pattern.clone())?),
        };

        let controller = PipelineController::new(factory, Arc::new(SuspendPoint::new()));
        let branch = OutputBranch::new(
            stages.output.channels,
            stages.output.sample_rate.as_hz(),
            self.encoding,
        );
        let (bus_tx, bus_rx) = bounded::<BusMessage>(BUS_CAPACITY);
        let stop = StopHandle::new();

        tracing::info!(
            silence_threshold_db = self.config.silence_threshold_db,
            min_slice_length_ms = self.config.min_slice_length_ms,
            aggregate = ?self.config.channel_aggregate,
            channels = stages.output.channels,
            sample_rate = stages.output.sample_rate.as_hz(),
            "Slicer starting"
        );

        let streaming = StreamingTask {
            source: self.source,
            mixer: stages.mixer,
            resampler: stages.resampler,
            effects: self.effects,
            meter: stages.meter,
            branch,
            controller: controller.clone(),
            block_frames: self.config.block_frames,
            stop: Arc::clone(&stop.0),
            bus: bus_tx,
        }
        .spawn()?;

        let control = ControlLoop::new(
            controller.clone(),
            self.config.heuristic(),
            bus_rx,
            Some(usize::from(stages.output.channels)),
        );

        Ok(SlicerHandle {
            control,
            controller,
            streaming,
            stop,
        })
    }

    /// Run decode, conversion, dynamics and metering only, on this thread
    ///
    /// Every report is handed to `on_report`; nothing is written. Returns
    /// the number of reports produced.
    pub fn scan_levels<F>(mut self, mut on_report: F) -> Result<u64>
    where
        F: FnMut(&LoudnessReport) -> Result<()>,
    {
        let mut stages = self.build_stages()?;
        let channels = usize::from(stages.output.channels);
        let rate = stages.output.sample_rate.as_hz();
        let mut count = 0u64;

        let mut meter_block = |samples: &mut Vec<f32>, stages: &mut Stages| -> Result<()> {
            self.effects.process(samples, channels, rate);
            for report in stages.meter.process(samples)? {
                on_report(&report)?;
                count += 1;
            }
            Ok(())
        };

        while let Some(block) = self.source.read_block(self.config.block_frames)? {
            let mixed = stages.mixer.process(&block.samples)?;
            let mut resampled = stages.resampler.process(&mixed).map_err(AudioError::from)?;
            meter_block(&mut resampled, &mut stages)?;
        }
        let mut tail = stages.resampler.flush().map_err(AudioError::from)?;
        meter_block(&mut tail, &mut stages)?;

        Ok(count)
    }
}

/// Requests a graceful stop from any thread
///
/// The streaming thread finishes its current block, closes the open slice
/// and posts end of stream.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Create an unset handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the pipeline to stop
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True once a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A running pipeline
pub struct SlicerHandle {
    control: ControlLoop,
    controller: PipelineController,
    streaming: JoinHandle<()>,
    stop: StopHandle,
}

impl SlicerHandle {
    /// Handle for stopping the run from another thread
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The controller driving this run
    pub fn controller(&self) -> &PipelineController {
        &self.controller
    }

    /// Run the control loop on this thread until end of stream or a fatal
    /// error, then join the streaming thread
    pub fn wait(self) -> Result<RunSummary> {
        let result = self.control.run();
        if result.is_err() {
            self.stop.stop();
        }

        if self.streaming.join().is_err() {
            tracing::error!("Streaming thread panicked");
            return result.and(Err(PipelineError::Disconnected));
        }

        if let Ok(summary) = &result {
            tracing::info!(
                slices = summary.slices.len(),
                frames = summary.total_frames(),
                cuts_ignored = summary.cuts_ignored,
                "Slicing finished"
            );
        }
        result
    }
}
