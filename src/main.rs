//! Bisub - bilingual subtitle translation with a local LLM
//!
//! Entry point: parses arguments, sets up logging, loads the configuration
//! and dispatches to the workflow.

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bisub::cli::{Args, Commands};
use bisub::config::Config;
use bisub::subtitle::compose_srt;
use bisub::workflow::Workflow;

const DEFAULT_CONFIG_FILE: &str = "bisub.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Writing the defaults must work even when the current config is broken
    if let Commands::InitConfig { output } = &args.command {
        Config::default().save_to_file(output)?;
        info!("Wrote default configuration to {}", output.display());
        return Ok(());
    }

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    let markup = config.markup.clone();
    let workflow = Workflow::new(config)?.with_progress(true);

    match args.command {
        Commands::Run { dir } => {
            workflow.check_connection().await?;
            tokio::select! {
                result = workflow.process_directory(&dir) => {
                    let completed = result?;
                    info!("Finished directory {}: {} files completed", dir.display(), completed);
                }
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted, the last completed batch is saved");
                }
            }
        }
        Commands::Translate { input } => {
            workflow.check_connection().await?;
            tokio::select! {
                result = workflow.process_file(&input) => {
                    let report = result?;
                    info!(
                        "Finished {}: {} cues, {} translated, {} corrected",
                        input.display(),
                        report.cues,
                        report.translated,
                        report.corrected
                    );
                }
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted, the last completed batch is saved");
                }
            }
        }
        Commands::Reformat { input, output } => {
            let track = workflow.reformat_preview(&input, output.as_deref())?;
            if output.is_none() {
                print!("{}", compose_srt(&track, &markup));
            }
        }
        Commands::Check => {
            workflow.check_connection().await?;
            println!("Oracle is reachable and all configured models are available");
        }
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".bisub").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "bisub.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("bisub.log").display());

    Ok(())
}
