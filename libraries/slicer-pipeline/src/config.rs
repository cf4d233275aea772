//! Pipeline configuration, fixed at startup

use crate::error::{PipelineError, Result};
use crate::heuristic::{ChannelAggregate, SliceHeuristic};
use crate::sink::SEQUENCE_PLACEHOLDER;
use serde::{Deserialize, Serialize};
use slicer_loudness::LevelSettings;
use std::time::Duration;

/// Metering cadence and peak decay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Report cadence in milliseconds of stream time
    pub interval_ms: u64,
    /// How long a peak is held before it starts to fall
    pub peak_ttl_ms: u64,
    /// Fall rate of the decaying peak, dB per second
    pub peak_falloff_db: f64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            interval_ms: 20,
            peak_ttl_ms: 50,
            peak_falloff_db: 24.0,
        }
    }
}

impl LevelConfig {
    /// Meter settings for this configuration
    pub fn settings(&self) -> LevelSettings {
        LevelSettings {
            interval: Duration::from_millis(self.interval_ms),
            peak_ttl: Duration::from_millis(self.peak_ttl_ms),
            peak_falloff_db: self.peak_falloff_db,
        }
    }
}

/// Slicer configuration
///
/// Every field has a default, so partial documents deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlicerConfig {
    /// Level below which the stream counts as silent (dB)
    pub silence_threshold_db: f64,
    /// Shortest slice a cut may close (milliseconds)
    pub min_slice_length_ms: u64,
    /// How channel levels reduce to one value
    pub channel_aggregate: ChannelAggregate,
    /// Output location pattern; `{n}` becomes the slice number
    pub output_pattern: String,
    /// Frames pulled from the source per block
    pub block_frames: usize,
    /// Metering
    pub level: LevelConfig,
}

impl Default for SlicerConfig {
    fn default() -> Self {
        Self {
            silence_threshold_db: -36.0,
            min_slice_length_ms: 1000,
            channel_aggregate: ChannelAggregate::default(),
            output_pattern: "./{n}.wav".to_string(),
            block_frames: 1024,
            level: LevelConfig::default(),
        }
    }
}

impl SlicerConfig {
    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.silence_threshold_db.is_finite() {
            return Err(PipelineError::InvalidConfig(format!(
                "silence_threshold_db must be finite, got {}",
                self.silence_threshold_db
            )));
        }
        if !self.output_pattern.contains(SEQUENCE_PLACEHOLDER) {
            return Err(PipelineError::InvalidConfig(format!(
                "output_pattern {:?} has no {SEQUENCE_PLACEHOLDER} placeholder",
                self.output_pattern
            )));
        }
        if self.block_frames == 0 {
            return Err(PipelineError::InvalidConfig(
                "block_frames must be greater than zero".to_string(),
            ));
        }
        if self.level.interval_ms == 0 {
            return Err(PipelineError::InvalidConfig(
                "level.interval_ms must be greater than zero".to_string(),
            ));
        }
        if !self.level.peak_falloff_db.is_finite() || self.level.peak_falloff_db < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "level.peak_falloff_db must be a non-negative number, got {}",
                self.level.peak_falloff_db
            )));
        }
        Ok(())
    }

    /// Minimum slice length as a duration
    pub fn min_slice_length(&self) -> Duration {
        Duration::from_millis(self.min_slice_length_ms)
    }

    /// Heuristic for this configuration
    pub fn heuristic(&self) -> SliceHeuristic {
        SliceHeuristic::new(
            self.silence_threshold_db,
            self.min_slice_length(),
            self.channel_aggregate,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SlicerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.silence_threshold_db, -36.0);
        assert_eq!(config.min_slice_length(), Duration::from_secs(1));
        assert_eq!(config.level.settings().interval, Duration::from_millis(20));
        assert_eq!(config.channel_aggregate, ChannelAggregate::Loudest);
    }

    #[test]
    fn test_partial_document() {
        let config: SlicerConfig = serde_json::from_str(
            r#"{ "silence_threshold_db": -48.5, "level": { "interval_ms": 10 } }"#,
        )
        .unwrap();
        assert_eq!(config.silence_threshold_db, -48.5);
        assert_eq!(config.level.interval_ms, 10);
        assert_eq!(config.level.peak_ttl_ms, 50);
        assert_eq!(config.output_pattern, "./{n}.wav");
    }

    #[test]
    fn test_validation_rejections() {
        let cases: [fn(&mut SlicerConfig); 5] = [
            |c| c.output_pattern = "out.wav".to_string(),
            |c| c.block_frames = 0,
            |c| c.level.interval_ms = 0,
            |c| c.silence_threshold_db = f64::NAN,
            |c| c.level.peak_falloff_db = -1.0,
        ];
        for mutate in cases {
            let mut config = SlicerConfig::default();
            mutate(&mut config);
            assert!(matches!(
                config.validate(),
                Err(PipelineError::InvalidConfig(_))
            ));
        }
    }
}
