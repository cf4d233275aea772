/// Slicer configuration
///
/// Layered, lowest precedence first: built-in defaults, an optional TOML
/// file, `SLICER_`-prefixed environment variables, command-line flags.
use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use slicer_audio::effects::{Compressor, CompressorSettings, EffectChain, Gain, DEFAULT_GAIN_DB};
use slicer_audio::SampleEncoding;
use slicer_pipeline::{ChannelAggregate, LevelConfig, SlicerConfig};
use std::path::Path;

/// Environment variable prefix, e.g. `SLICER_SLICING__SILENCE_THRESHOLD_DB`
pub const ENV_PREFIX: &str = "SLICER";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_slicing")]
    pub slicing: SlicingSettings,

    #[serde(default)]
    pub level: LevelConfig,

    #[serde(default = "default_dynamics")]
    pub dynamics: DynamicsSettings,

    #[serde(default = "default_output")]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SlicingSettings {
    #[serde(default = "default_silence_threshold_db")]
    pub silence_threshold_db: f64,

    #[serde(default = "default_min_slice_length_ms")]
    pub min_slice_length_ms: u64,

    #[serde(default)]
    pub channel_aggregate: ChannelAggregate,

    #[serde(default = "default_block_frames")]
    pub block_frames: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DynamicsSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_compressor_threshold_db")]
    pub threshold_db: f32,

    #[serde(default = "default_ratio")]
    pub ratio: f32,

    #[serde(default = "default_knee_db")]
    pub knee_db: f32,

    #[serde(default = "default_attack_ms")]
    pub attack_ms: f32,

    #[serde(default = "default_release_ms")]
    pub release_ms: f32,

    #[serde(default)]
    pub makeup_gain_db: f32,

    #[serde(default = "default_gain_db")]
    pub gain_db: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OutputSettings {
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Output channel count; 0 keeps the input's
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Output sample rate in Hz; 0 keeps the input's
    #[serde(default)]
    pub sample_rate: u32,

    #[serde(default)]
    pub sample_format: SampleFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    #[default]
    Float32,
    Int16,
}

impl SampleFormat {
    pub fn encoding(self) -> SampleEncoding {
        match self {
            SampleFormat::Float32 => SampleEncoding::Float32,
            SampleFormat::Int16 => SampleEncoding::Int16,
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(CliError::Config(format!(
                    "config file {} not found",
                    path.display()
                )));
            }
            settings = settings.add_source(config::File::from(path));
        }

        // Nested keys use a double underscore: SLICER_OUTPUT__SAMPLE_RATE
        settings = settings.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Pipeline configuration
    pub fn slicer_config(&self) -> SlicerConfig {
        SlicerConfig {
            silence_threshold_db: self.slicing.silence_threshold_db,
            min_slice_length_ms: self.slicing.min_slice_length_ms,
            channel_aggregate: self.slicing.channel_aggregate,
            output_pattern: self.output.pattern.clone(),
            block_frames: self.slicing.block_frames,
            level: self.level.clone(),
        }
    }

    /// Compressor followed by gain, or an empty chain when disabled
    pub fn effects(&self) -> EffectChain {
        let mut chain = EffectChain::new();
        if !self.dynamics.enabled {
            return chain;
        }

        let mut compressor = CompressorSettings {
            threshold_db: self.dynamics.threshold_db,
            ratio: self.dynamics.ratio,
            attack_ms: self.dynamics.attack_ms,
            release_ms: self.dynamics.release_ms,
            knee_db: self.dynamics.knee_db,
            makeup_gain_db: self.dynamics.makeup_gain_db,
        };
        compressor.validate();
        chain.add_effect(Box::new(Compressor::with_settings(compressor)));
        chain.add_effect(Box::new(Gain::new(self.dynamics.gain_db)));
        chain
    }

    /// Requested output channel count, `None` to keep the input's
    pub fn output_channels(&self) -> Option<u16> {
        (self.output.channels != 0).then_some(self.output.channels)
    }

    /// Requested output sample rate, `None` to keep the input's
    pub fn output_sample_rate(&self) -> Option<u32> {
        (self.output.sample_rate != 0).then_some(self.output.sample_rate)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.slicer_config().validate()?;

        if self.output.channels > 8 {
            return Err(CliError::Config(format!(
                "output.channels must be 0 (keep input) or 1-8, got {}",
                self.output.channels
            )));
        }
        if !self.dynamics.gain_db.is_finite() {
            return Err(CliError::Config(
                "dynamics.gain_db must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

// Default values
fn default_slicing() -> SlicingSettings {
    SlicingSettings {
        silence_threshold_db: default_silence_threshold_db(),
        min_slice_length_ms: default_min_slice_length_ms(),
        channel_aggregate: ChannelAggregate::default(),
        block_frames: default_block_frames(),
    }
}

fn default_silence_threshold_db() -> f64 {
    -36.0
}

fn default_min_slice_length_ms() -> u64 {
    1000
}

fn default_block_frames() -> usize {
    1024
}

fn default_dynamics() -> DynamicsSettings {
    let compressor = CompressorSettings::default();
    DynamicsSettings {
        enabled: default_enabled(),
        threshold_db: compressor.threshold_db,
        ratio: compressor.ratio,
        knee_db: compressor.knee_db,
        attack_ms: compressor.attack_ms,
        release_ms: compressor.release_ms,
        makeup_gain_db: compressor.makeup_gain_db,
        gain_db: default_gain_db(),
    }
}

fn default_enabled() -> bool {
    true
}

fn default_compressor_threshold_db() -> f32 {
    CompressorSettings::default().threshold_db
}

fn default_ratio() -> f32 {
    CompressorSettings::default().ratio
}

fn default_knee_db() -> f32 {
    CompressorSettings::default().knee_db
}

fn default_attack_ms() -> f32 {
    CompressorSettings::default().attack_ms
}

fn default_release_ms() -> f32 {
    CompressorSettings::default().release_ms
}

fn default_gain_db() -> f32 {
    DEFAULT_GAIN_DB
}

fn default_output() -> OutputSettings {
    OutputSettings {
        pattern: default_pattern(),
        channels: default_channels(),
        sample_rate: 0,
        sample_format: SampleFormat::default(),
    }
}

fn default_pattern() -> String {
    "./{n}.wav".to_string()
}

fn default_channels() -> u16 {
    1
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slicing: default_slicing(),
            level: LevelConfig::default(),
            dynamics: default_dynamics(),
            output: default_output(),
        }
    }
}
