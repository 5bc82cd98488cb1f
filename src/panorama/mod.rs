//! # Panorama Configuration
//!
//! Resolves which masks a panorama uses and where they live on disk:
//!
//! - [`mapping`] - mask index assignments from the JSON mapping file
//! - [`layout`] - one-time directory scan turning keys into asset paths

pub mod layout;
pub mod mapping;

pub use layout::{PanoramaLayout, SequenceAsset, StaticAsset};
pub use mapping::{MappingFile, PanoramaConfig, RawPanoramaMapping, SequenceBinding, StaticBinding};
