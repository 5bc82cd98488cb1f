use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pano_masker::{config::Settings, monitor::Orchestrator};

#[derive(Parser)]
#[command(
    name = "pano-masker",
    version,
    about = "Compose indexed panoramic masks whenever the state file changes",
    long_about = "Pano-Masker loads the static and sequence masks of one panorama, watches an externally written state file and writes a numbered 8-bit indexed bitmap for every state change."
)]
struct Cli {
    /// Panorama identifier (a key of the mask mapping file)
    panorama: String,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the state file location
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Override the results directory
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Starting pano-masker v{}", env!("CARGO_PKG_VERSION"));

    let mut settings = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Settings::from_file(config_path)
                .with_context(|| format!("Failed to load configuration {:?}", config_path))?
        }
        None => {
            info!("Using default configuration");
            Settings::default()
        }
    };

    if let Some(state_file) = cli.state_file {
        settings.paths.state_file = state_file;
    }
    if let Some(results_dir) = cli.results_dir {
        settings.paths.results_dir = results_dir;
    }

    let mut orchestrator = match Orchestrator::bootstrap(&settings, &cli.panorama) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!("{}", e.user_message());
            return Err(e).with_context(|| format!("Cannot start panorama {}", cli.panorama));
        }
    };

    let stats = orchestrator.run().await;
    info!("Wrote {} results", stats.writes);
    Ok(())
}
