//! # Composition Engine
//!
//! Merges a panorama's static masks and the active sequence frame into a
//! single indexed buffer.

pub mod compositor;

// Re-exports for convenience
pub use compositor::{
    CompositeResult, Compositor, LayerSource, LayerStats, ResolvedLayer, BACKGROUND_INDEX,
};
