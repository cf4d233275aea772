/// CLI error types
use slicer_audio::AudioError;
use slicer_pipeline::PipelineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

/// Process exit status for a graceful run
pub const EXIT_OK: u8 = 0;

/// Process exit status for any failure other than a sink failure
pub const EXIT_FAILURE: u8 = 1;

/// Process exit status when an output slice could not be created or swapped
pub const EXIT_SINK_FAILURE: u8 = 2;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Cannot open input: {0}")]
    Input(#[from] AudioError),

    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pipeline task failed: {0}")]
    Task(String),
}

impl From<config::ConfigError> for CliError {
    fn from(err: config::ConfigError) -> Self {
        CliError::Config(err.to_string())
    }
}

impl CliError {
    /// Exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Pipeline(e) if e.is_sink_failure() => EXIT_SINK_FAILURE,
            _ => EXIT_FAILURE,
        }
    }
}

/// Exit status for an error chain
///
/// Looks through `anyhow` context layers for the underlying cause.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<CliError>() {
            return e.exit_code();
        }
        if let Some(e) = cause.downcast_ref::<PipelineError>() {
            if e.is_sink_failure() {
                return EXIT_SINK_FAILURE;
            }
        }
    }
    EXIT_FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    fn swap_failed() -> PipelineError {
        PipelineError::SinkSwapFailed {
            sequence: 4,
            reason: "disk full".to_string(),
        }
    }

    #[test]
    fn test_sink_failures_exit_two() {
        assert_eq!(CliError::from(swap_failed()).exit_code(), EXIT_SINK_FAILURE);

        let err = anyhow::Error::from(CliError::from(swap_failed())).context("slicing input.wav");
        assert_eq!(exit_code(&err), EXIT_SINK_FAILURE);

        let result: std::result::Result<(), PipelineError> = Err(swap_failed());
        let err = result.context("slicing").unwrap_err();
        assert_eq!(exit_code(&err), EXIT_SINK_FAILURE);
    }

    #[test]
    fn test_other_errors_exit_one() {
        assert_eq!(
            CliError::Config("bad threshold".to_string()).exit_code(),
            EXIT_FAILURE
        );
        assert_eq!(
            CliError::from(PipelineError::InvalidConfig("no {n}".to_string())).exit_code(),
            EXIT_FAILURE
        );
        assert_eq!(exit_code(&anyhow::anyhow!("unreadable")), EXIT_FAILURE);
    }
}
