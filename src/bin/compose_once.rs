// Compose a single state without starting the monitoring loop

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pano_masker::{
    composition::Compositor,
    config::Settings,
    masks::MaskStore,
    output::ResultWriter,
    panorama::MappingFile,
    state::StateRecord,
};

#[derive(Parser)]
#[command(name = "compose_once", about = "Compose one state record and write it to the results directory")]
struct Args {
    /// Panorama identifier
    panorama: String,

    /// State record, e.g. "35:3" or "none"
    state: String,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the results directory
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    if let Some(output) = args.output {
        settings.paths.results_dir = output;
    }
    settings.validate()?;

    let state: StateRecord = args.state.parse()?;
    state.validate(settings.monitor.max_sequence)?;

    let config = MappingFile::from_file(&settings.paths.mapping_file)?.panorama(&args.panorama)?;

    let started = Instant::now();
    let store = MaskStore::open(&settings.paths.panorama_dir(&args.panorama), &config, &settings.masks)
        .with_context(|| format!("Failed to load masks for {}", args.panorama))?;
    info!("Masks loaded in {:.2}s", started.elapsed().as_secs_f64());

    let result = Compositor::new(store.resolution()).compose(&config, &store, &state)?;
    for layer in result.layers() {
        info!("{:?}: {} pixels -> index {}", layer.source, layer.pixels_set, layer.index);
    }

    let path = ResultWriter::new(&settings.paths.results_dir)?.write(&result)?;
    println!("{}", path.display());
    Ok(())
}
