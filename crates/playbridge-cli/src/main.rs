//! Playbridge CLI - Headless host for the playback bridge
//!
//! Features:
//! - Locator classification
//! - Playback through the simulated engine with a live event stream
//! - Replay of host command scripts

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

/// Playbridge CLI - Drive player sessions without a host UI
#[derive(Parser)]
#[command(name = "playbridge")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Headless host for the video player bridge", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Bridge configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify locators into source adapters
    Classify {
        /// Locators to classify
        #[arg(required = true)]
        locators: Vec<String>,

        /// Format hint (ss, dash, hls, other)
        #[arg(long)]
        hint: Option<String>,
    },

    /// Play a locator through the simulated engine
    Play {
        /// Locator, or asset name with --asset
        locator: String,

        /// Treat the locator as a bundled asset name
        #[arg(long)]
        asset: bool,

        /// Package the asset belongs to
        #[arg(long, requires = "asset")]
        package: Option<String>,

        /// Format hint (ss, dash, hls, other)
        #[arg(long)]
        hint: Option<String>,

        /// Loop playback
        #[arg(short, long)]
        looping: bool,

        /// Initial volume
        #[arg(long)]
        volume: Option<f64>,

        /// Simulated media duration in milliseconds
        #[arg(short, long, default_value = "3000")]
        duration_ms: u64,

        /// Inject an engine failure this long after ready
        #[arg(long)]
        fail_after_ms: Option<u64>,

        /// Stop after this many seconds
        #[arg(short, long, default_value = "10")]
        seconds: u64,
    },

    /// Replay a JSON command script against the simulated engine
    Run {
        /// Script file: array of {method, arguments, delayMs}
        script: PathBuf,
    },

    /// Print the effective bridge configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    playbridge_core::init();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Classify { locators, hint } => {
            commands::classify(&config, &locators, hint.as_deref(), &cli.format)?;
        }
        Commands::Play {
            locator,
            asset,
            package,
            hint,
            looping,
            volume,
            duration_ms,
            fail_after_ms,
            seconds,
        } => {
            let request = commands::PlayRequest {
                locator,
                asset,
                package,
                hint,
                looping,
                volume,
                duration_ms,
                fail_after_ms,
                seconds,
            };
            commands::play(config, request, &cli.format).await?;
        }
        Commands::Run { script } => {
            commands::run_script(config, &script, &cli.format).await?;
        }
        Commands::Config => {
            println!("{}", output::format_output(&config, "json"));
        }
    }

    Ok(())
}
