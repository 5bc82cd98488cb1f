//! # Mask Storage
//!
//! Loads and validates the binary masks a panorama is composed from.
//!
//! ## Core Features
//!
//! - **Strict validation**: every asset must match the target resolution and
//!   hold only the two binary gray levels; nothing is resized or thresholded
//! - **Eager loading**: static masks and all sequence frames are decoded once,
//!   in parallel, before the monitoring loop starts
//! - **Lookup by index**: static masks by output index, dynamic masks by
//!   (sequence, frame)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pano_masker::{config::Settings, masks::MaskStore, panorama::MappingFile};
//!
//! # fn main() -> anyhow::Result<()> {
//! let settings = Settings::default();
//! let config = MappingFile::from_file(&settings.paths.mapping_file)?.panorama("P01")?;
//! let store = MaskStore::open(&settings.paths.panorama_dir("P01"), &config, &settings.masks)?;
//!
//! let frame = store.get_sequence_frame(35, 3)?;
//! println!("Frame covers {} pixels", frame.covered_pixels());
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod store;
pub mod types;

pub use loader::MaskLoader;
pub use store::{MaskStore, SequenceFrames, StaticMask};
pub use types::{MaskImage, Resolution, COVERED_LEVEL, EMPTY_LEVEL};
