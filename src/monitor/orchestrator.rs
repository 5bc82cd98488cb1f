use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::{
    composition::Compositor,
    config::Settings,
    error::{CompositorError, Result},
    masks::MaskStore,
    output::ResultWriter,
    panorama::{MappingFile, PanoramaConfig},
    state::{StateRecord, StateWatcher},
};

/// Where the monitoring loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Polling,
    Resolving,
    Composing,
    Writing,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Polling => "polling",
            Self::Resolving => "resolving",
            Self::Composing => "composing",
            Self::Writing => "writing",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Result of a single loop iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// State file unchanged (or still being written)
    Unchanged,

    /// A state change could not be processed; nothing was written
    Skipped { reason: String },

    /// A composite was written
    Written { number: u64, path: PathBuf },
}

/// Counters accumulated over the lifetime of the loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub writes: u64,
    pub skipped: u64,
}

/// Drives the state-driven composition loop
///
/// The orchestrator exclusively owns the mutable state carried between
/// iterations: the last accepted state record (inside the watcher) and the
/// output counter (inside the writer).
///
/// Each tick follows: poll the state file, resolve the masks it names,
/// compose them, write the result. Any failure after polling is logged and
/// the tick ends without output; the loop never stops because of one.
pub struct Orchestrator {
    config: PanoramaConfig,
    store: MaskStore,
    watcher: StateWatcher,
    compositor: Compositor,
    writer: ResultWriter,
    poll_interval: Duration,
    phase: Phase,
    stats: LoopStats,
}

impl Orchestrator {
    /// Wire already constructed components together
    pub fn new(
        config: PanoramaConfig,
        store: MaskStore,
        watcher: StateWatcher,
        writer: ResultWriter,
        poll_interval: Duration,
    ) -> Self {
        let compositor = Compositor::new(store.resolution());
        Self {
            config,
            store,
            watcher,
            compositor,
            writer,
            poll_interval,
            phase: Phase::Idle,
            stats: LoopStats::default(),
        }
    }

    /// Load everything a panorama needs; every error here is startup-fatal
    pub fn bootstrap(settings: &Settings, panorama_id: &str) -> Result<Self> {
        info!("Initializing pano-masker for panorama {}", panorama_id);
        settings.validate()?;

        debug!("Loading mask mapping from {:?}", settings.paths.mapping_file);
        let config = MappingFile::from_file(&settings.paths.mapping_file)?.panorama(panorama_id)?;

        let store = MaskStore::open(
            &settings.paths.panorama_dir(panorama_id),
            &config,
            &settings.masks,
        )?;

        let watcher = StateWatcher::new(&settings.paths.state_file, settings.monitor.max_sequence);
        let writer = ResultWriter::new(&settings.paths.results_dir)?;

        Ok(Self::new(
            config,
            store,
            watcher,
            writer,
            settings.monitor.poll_interval(),
        ))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn config(&self) -> &PanoramaConfig {
        &self.config
    }

    pub fn store(&self) -> &MaskStore {
        &self.store
    }

    /// Record currently in effect
    pub fn current_state(&self) -> Option<StateRecord> {
        self.watcher.current()
    }

    /// Number of the last written output
    pub fn last_output(&self) -> u64 {
        self.writer.last_number()
    }

    /// Run one iteration: poll, and on change resolve, compose and write
    pub fn tick(&mut self) -> TickOutcome {
        self.stats.ticks += 1;
        self.enter(Phase::Polling);

        let outcome = match self.watcher.poll() {
            Ok(None) => TickOutcome::Unchanged,
            Ok(Some(record)) => self.process(record),
            Err(e) => {
                warn!("Ignoring state update: {}", e);
                TickOutcome::Skipped { reason: e.to_string() }
            }
        };

        if let TickOutcome::Skipped { .. } = outcome {
            self.stats.skipped += 1;
        }

        self.enter(Phase::Idle);
        outcome
    }

    /// Poll until `shutdown` completes, then enter [`Phase::Stopped`]
    ///
    /// Shutdown is checked between iterations, so a write in progress
    /// always finishes first.
    pub async fn run_until<F>(&mut self, shutdown: F) -> LoopStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            "Monitoring {:?} every {:?}",
            self.watcher.path(),
            self.poll_interval
        );

        loop {
            self.tick();

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        self.enter(Phase::Stopped);
        info!(
            "Monitor stopped after {} ticks ({} written, {} skipped)",
            self.stats.ticks, self.stats.writes, self.stats.skipped
        );
        self.stats
    }

    /// Poll until Ctrl-C
    pub async fn run(&mut self) -> LoopStats {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        })
        .await
    }

    fn process(&mut self, record: StateRecord) -> TickOutcome {
        let started = Instant::now();
        info!("Processing state {}", record);

        match self.compose_and_write(record) {
            Ok(path) => {
                let number = self.writer.last_number();
                self.stats.writes += 1;
                info!(
                    "Result #{} saved to {:?} in {:.3}s",
                    number,
                    path,
                    started.elapsed().as_secs_f64()
                );
                TickOutcome::Written { number, path }
            }
            Err(e) => {
                self.log_failure(record, &e);
                TickOutcome::Skipped { reason: e.to_string() }
            }
        }
    }

    fn compose_and_write(&mut self, record: StateRecord) -> Result<PathBuf> {
        self.enter(Phase::Resolving);
        let layers = self.compositor.resolve(&self.config, &self.store, &record)?;

        // `layers` still borrows the store
        transition(&mut self.phase, Phase::Composing);
        let result = self.compositor.merge(record, &layers);
        for layer in result.layers() {
            debug!("Set {} pixels to index {}", layer.pixels_set, layer.index);
        }

        self.enter(Phase::Writing);
        self.writer.write(&result)
    }

    fn log_failure(&self, record: StateRecord, e: &CompositorError) {
        if e.is_recoverable() {
            warn!("Skipping state {} during {}: {}", record, self.phase(), e);
        } else {
            error!("Skipping state {} during {}: {}", record, self.phase(), e);
        }
    }

    fn enter(&mut self, phase: Phase) {
        transition(&mut self.phase, phase);
    }
}

fn transition(current: &mut Phase, next: Phase) {
    trace!("{} -> {}", current, next);
    *current = next;
}
