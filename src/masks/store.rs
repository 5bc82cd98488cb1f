use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::MaskSettings;
use crate::error::{CompositorError, LookupError, Result};
use crate::masks::loader::MaskLoader;
use crate::masks::types::{MaskImage, Resolution};
use crate::panorama::{PanoramaConfig, PanoramaLayout};

/// A static mask together with its configured key and index
#[derive(Debug, Clone)]
pub struct StaticMask {
    pub key: String,
    pub index: u8,
    pub mask: MaskImage,
}

/// All loaded frames of one sequence
#[derive(Debug, Clone)]
pub struct SequenceFrames {
    pub index: u8,
    frames: BTreeMap<u32, MaskImage>,
}

impl SequenceFrames {
    /// Highest loaded frame number
    pub fn last_frame(&self) -> Option<u32> {
        self.frames.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// What a decoded asset belongs to
#[derive(Debug, Clone)]
enum LoadTarget {
    Static { key: String, index: u8 },
    Frame { sequence: u32, index: u8, frame: u32 },
}

/// Every mask of one panorama, decoded eagerly and read-only afterwards
///
/// Memory grows with width x height x number of masks; this is accepted so
/// that per-state composition never touches the disk.
#[derive(Debug, Clone)]
pub struct MaskStore {
    resolution: Resolution,
    hold_last_frame: bool,
    statics: BTreeMap<u8, StaticMask>,
    sequences: HashMap<u32, SequenceFrames>,
}

impl MaskStore {
    /// Create an empty store
    pub fn new(resolution: Resolution, hold_last_frame: bool) -> Self {
        Self {
            resolution,
            hold_last_frame,
            statics: BTreeMap::new(),
            sequences: HashMap::new(),
        }
    }

    /// Scan the panorama directory and load every configured mask
    pub fn open(
        panorama_dir: &std::path::Path,
        config: &PanoramaConfig,
        settings: &MaskSettings,
    ) -> Result<Self> {
        let layout = PanoramaLayout::scan(panorama_dir, config)?;
        Self::load(&layout, settings)
    }

    /// Decode every asset of a scanned layout in parallel
    ///
    /// Static masks must all load. Sequence frames that fail to decode or
    /// validate are logged and left out of the store.
    pub fn load(layout: &PanoramaLayout, settings: &MaskSettings) -> Result<Self> {
        let resolution = settings.resolution();
        let mut jobs: Vec<(LoadTarget, PathBuf)> = Vec::new();

        for asset in &layout.statics {
            jobs.push((
                LoadTarget::Static { key: asset.key.clone(), index: asset.index },
                asset.path.clone(),
            ));
        }
        for sequence in &layout.sequences {
            for (&frame, path) in &sequence.frames {
                jobs.push((
                    LoadTarget::Frame { sequence: sequence.sequence, index: sequence.index, frame },
                    path.clone(),
                ));
            }
        }

        info!(
            "Loading {} mask assets at {} with {} threads",
            jobs.len(),
            resolution,
            settings.load_threads
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.load_threads)
            .build()
            .map_err(|e| CompositorError::generic(format!("Failed to start loader pool: {}", e)))?;

        let decoded: Vec<(LoadTarget, Result<MaskImage>)> = pool.install(|| {
            jobs.par_iter()
                .map(|(target, path)| (target.clone(), MaskLoader::load(path, resolution)))
                .collect()
        });

        // A bad static mask is fatal; a bad frame is dropped so that only the
        // states naming it fail to compose
        let mut store = Self::new(resolution, settings.hold_last_frame);
        let mut dropped = 0;
        for (target, mask) in decoded {
            match target {
                LoadTarget::Static { key, index } => store.insert_static(key, index, mask?)?,
                LoadTarget::Frame { sequence, index, frame } => match mask {
                    Ok(mask) => store.insert_frame(sequence, index, frame, mask)?,
                    Err(e) => {
                        warn!("Dropping sequence {} frame {}: {}", sequence, frame, e);
                        dropped += 1;
                    }
                },
            }
        }

        if dropped > 0 {
            warn!("{} sequence frames failed to load and will be skipped", dropped);
        }

        info!(
            "Loaded {} static masks and {} sequence frames (~{:.1} MB)",
            store.static_count(),
            store.frame_count(),
            store.memory_bytes() as f64 / 1024.0 / 1024.0
        );

        Ok(store)
    }

    /// Add a static mask
    pub fn insert_static(&mut self, key: impl Into<String>, index: u8, mask: MaskImage) -> Result<()> {
        let key = key.into();
        self.resolution.ensure_matches(&key, mask.width(), mask.height())?;
        self.statics.insert(index, StaticMask { key, index, mask });
        Ok(())
    }

    /// Add one frame of a sequence
    pub fn insert_frame(&mut self, sequence: u32, index: u8, frame: u32, mask: MaskImage) -> Result<()> {
        let name = format!("sequence {} frame {}", sequence, frame);
        self.resolution.ensure_matches(&name, mask.width(), mask.height())?;
        self.sequences
            .entry(sequence)
            .or_insert_with(|| SequenceFrames { index, frames: BTreeMap::new() })
            .frames
            .insert(frame, mask);
        Ok(())
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Static mask registered under `index`
    pub fn get_static(&self, index: u8) -> Result<&MaskImage> {
        self.statics
            .get(&index)
            .map(|s| &s.mask)
            .ok_or_else(|| LookupError::StaticIndex { index }.into())
    }

    /// Frame `frame` of sequence `sequence`
    ///
    /// With hold-last-frame enabled, frames past the end of a sequence resolve
    /// to its last frame. Gaps inside the sequence are still lookup errors.
    pub fn get_sequence_frame(&self, sequence: u32, frame: u32) -> Result<&MaskImage> {
        let frames = self
            .sequences
            .get(&sequence)
            .ok_or(LookupError::Sequence { sequence })?;

        if let Some(mask) = frames.frames.get(&frame) {
            return Ok(mask);
        }

        if self.hold_last_frame {
            if let Some((&last, mask)) = frames.frames.iter().next_back() {
                if frame > last {
                    debug!("Sequence {} frame {} held at last frame {}", sequence, frame, last);
                    return Ok(mask);
                }
            }
        }

        Err(LookupError::Frame { sequence, frame }.into())
    }

    /// Loaded frames of a sequence
    pub fn sequence(&self, sequence: u32) -> Option<&SequenceFrames> {
        self.sequences.get(&sequence)
    }

    /// Static masks in ascending index order
    pub fn statics(&self) -> impl Iterator<Item = &StaticMask> {
        self.statics.values()
    }

    pub fn static_count(&self) -> usize {
        self.statics.len()
    }

    pub fn frame_count(&self) -> usize {
        self.sequences.values().map(|s| s.len()).sum()
    }

    /// Approximate bytes held by decoded masks
    pub fn memory_bytes(&self) -> usize {
        (self.static_count() + self.frame_count()) * self.resolution.pixel_count()
    }
}
