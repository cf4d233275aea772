/// Slicer - split a recording into numbered WAV files at silent moments
use anyhow::Context;
use clap::Parser;
use slicer_cli::{commands, exit_code, AppConfig, Cli, Commands};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so `levels` output stays clean on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slicer=info,slicer_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Slice { input, overrides } => {
            overrides.apply(&mut config);
            config.validate()?;

            let summary = commands::slice(config, input.clone())
                .await
                .with_context(|| format!("slicing {}", input.display()))?;
            commands::print_summary(&summary, &mut std::io::stdout().lock())?;
        }
        Commands::Levels { input, overrides } => {
            overrides.apply(&mut config);
            config.validate()?;

            let count = commands::levels(config, input.clone(), std::io::stdout())
                .await
                .with_context(|| format!("measuring {}", input.display()))?;
            tracing::info!(reports = count, "Levels done");
        }
    }

    Ok(())
}
