/// Subcommand implementations
///
/// The pipeline runs on blocking threads; the async side only waits for it
/// and turns Ctrl-C into a graceful stop.
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use slicer_audio::SymphoniaSource;
use slicer_core::AudioSource;
use slicer_pipeline::{RunSummary, Slicer};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::task::JoinError;

fn build_slicer(config: &AppConfig, input: &Path) -> Result<Slicer> {
    let source = SymphoniaSource::open(input)?;
    tracing::info!(
        input = %input.display(),
        duration = ?source.duration(),
        "Input opened"
    );

    Ok(Slicer::new(config.slicer_config(), Box::new(source))
        .with_effects(config.effects())
        .with_output_format(config.output_channels(), config.output_sample_rate())
        .with_encoding(config.output.sample_format.encoding()))
}

fn task_error(err: JoinError) -> CliError {
    CliError::Task(err.to_string())
}

/// Slice `input` until it ends or Ctrl-C is pressed
pub async fn slice(config: AppConfig, input: PathBuf) -> Result<RunSummary> {
    let slicer = build_slicer(&config, &input)?;
    let handle = slicer.start()?;
    let stop = handle.stop_handle();

    let mut run = tokio::task::spawn_blocking(move || handle.wait());

    let result = tokio::select! {
        joined = &mut run => joined.map_err(task_error)?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupt received, closing the open slice");
            stop.stop();
            run.await.map_err(task_error)?
        }
    };

    Ok(result?)
}

/// Write every loudness report of `input` to `out` as one JSON object per
/// line
pub async fn levels<W>(config: AppConfig, input: PathBuf, out: W) -> Result<u64>
where
    W: Write + Send + 'static,
{
    tokio::task::spawn_blocking(move || -> Result<u64> {
        let slicer = build_slicer(&config, &input)?;
        let mut out = io::BufWriter::new(out);

        let count = slicer.scan_levels(|report| {
            serde_json::to_writer(&mut out, report).map_err(io::Error::from)?;
            out.write_all(b"\n")?;
            Ok(())
        })?;

        out.flush()?;
        Ok(count)
    })
    .await
    .map_err(task_error)?
}

/// Human-readable run summary
pub fn print_summary<W: Write>(summary: &RunSummary, out: &mut W) -> io::Result<()> {
    for slice in &summary.slices {
        writeln!(
            out,
            "{:>4}  {}  {} -> {}  {} frames",
            slice.sequence, slice.location, slice.start_time, slice.end_time, slice.frames
        )?;
    }
    writeln!(
        out,
        "{} slices, {} frames, {} reports ({} discarded, {} cuts ignored)",
        summary.slices.len(),
        summary.total_frames(),
        summary.reports,
        summary.reports_discarded,
        summary.cuts_ignored
    )
}
