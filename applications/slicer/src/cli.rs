/// Command-line interface
use crate::config::{AppConfig, SampleFormat};
use clap::{Args, Parser, Subcommand, ValueEnum};
use slicer_pipeline::ChannelAggregate;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "slicer")]
#[command(version, about = "Split a recording into numbered WAV files at silent moments", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "SLICER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Slice the input into files until it ends or Ctrl-C is pressed
    Slice {
        /// Audio file to slice
        input: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Print every loudness report as a JSON line without writing slices
    Levels {
        /// Audio file to measure
        input: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AggregateArg {
    First,
    Loudest,
    Quietest,
    Mean,
}

impl From<AggregateArg> for ChannelAggregate {
    fn from(arg: AggregateArg) -> Self {
        match arg {
            AggregateArg::First => ChannelAggregate::First,
            AggregateArg::Loudest => ChannelAggregate::Loudest,
            AggregateArg::Quietest => ChannelAggregate::Quietest,
            AggregateArg::Mean => ChannelAggregate::Mean,
        }
    }
}

/// Flags overriding file and environment configuration
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Silence threshold in dB
    #[arg(short, long, allow_negative_numbers = true)]
    pub threshold: Option<f64>,

    /// Minimum slice length in milliseconds
    #[arg(short, long)]
    pub min_length_ms: Option<u64>,

    /// How channel levels combine into one
    #[arg(long, value_enum)]
    pub aggregate: Option<AggregateArg>,

    /// Output pattern; `{n}` becomes the slice number
    #[arg(short, long)]
    pub output: Option<String>,

    /// Output channel count (0 keeps the input's)
    #[arg(long)]
    pub channels: Option<u16>,

    /// Output sample rate in Hz (0 keeps the input's)
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Output sample format
    #[arg(long, value_enum)]
    pub sample_format: Option<SampleFormat>,

    /// Skip the compressor and gain stages
    #[arg(long)]
    pub no_dynamics: bool,
}

impl Overrides {
    /// Apply the flags that were given
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(threshold) = self.threshold {
            config.slicing.silence_threshold_db = threshold;
        }
        if let Some(min_length_ms) = self.min_length_ms {
            config.slicing.min_slice_length_ms = min_length_ms;
        }
        if let Some(aggregate) = self.aggregate {
            config.slicing.channel_aggregate = aggregate.into();
        }
        if let Some(pattern) = &self.output {
            config.output.pattern.clone_from(pattern);
        }
        if let Some(channels) = self.channels {
            config.output.channels = channels;
        }
        if let Some(sample_rate) = self.sample_rate {
            config.output.sample_rate = sample_rate;
        }
        if let Some(sample_format) = self.sample_format {
            config.output.sample_format = sample_format;
        }
        if self.no_dynamics {
            config.dynamics.enabled = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_slice_overrides() {
        let cli = Cli::try_parse_from([
            "slicer",
            "slice",
            "session.flac",
            "--threshold",
            "-42.5",
            "-m",
            "2500",
            "--output",
            "takes/{n}.wav",
            "--aggregate",
            "quietest",
            "--sample-format",
            "int16",
            "--no-dynamics",
        ])
        .unwrap();

        let Commands::Slice { input, overrides } = cli.command else {
            panic!("expected slice command");
        };
        assert_eq!(input, PathBuf::from("session.flac"));

        let mut config = AppConfig::default();
        overrides.apply(&mut config);
        assert_eq!(config.slicing.silence_threshold_db, -42.5);
        assert_eq!(config.slicing.min_slice_length_ms, 2500);
        assert_eq!(config.slicing.channel_aggregate, ChannelAggregate::Quietest);
        assert_eq!(config.output.pattern, "takes/{n}.wav");
        assert_eq!(config.output.sample_format, SampleFormat::Int16);
        assert!(!config.dynamics.enabled);
        // Untouched values keep their defaults
        assert_eq!(config.output.channels, 1);
    }

    #[test]
    fn test_levels_requires_input() {
        assert!(Cli::try_parse_from(["slicer", "levels"]).is_err());
        let cli = Cli::try_parse_from(["slicer", "--config", "slicer.toml", "levels", "a.wav"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("slicer.toml")));
        assert!(matches!(cli.command, Commands::Levels { .. }));
    }
}
