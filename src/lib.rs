//! # Pano-Masker
//!
//! Compose indexed panoramic masks in response to an externally written
//! state file.
//!
//! A panorama owns a set of binary masks, each assigned an integer index by a
//! JSON mapping file. Static masks are always drawn; sequence masks are drawn
//! one frame at a time, selected by the `sequence:frame` record in the state
//! file. Every state change produces one 8-bit bitmap whose pixels hold the
//! index of the topmost covering mask.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pano_masker::{config::Settings, monitor::Orchestrator};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let settings = Settings::default();
//! let mut orchestrator = Orchestrator::bootstrap(&settings, "P01")?;
//! orchestrator.run().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`panorama`] - mask mapping and asset discovery
//! - [`masks`] - mask decoding and the in-memory mask store
//! - [`state`] - state record parsing and change detection
//! - [`composition`] - layering masks into an indexed buffer
//! - [`output`] - numbered bitmap output
//! - [`monitor`] - the polling loop
//! - [`config`] - configuration management

pub mod composition;
pub mod config;
pub mod error;
pub mod masks;
pub mod monitor;
pub mod output;
pub mod panorama;
pub mod state;

pub use crate::{
    composition::{CompositeResult, Compositor},
    config::Settings,
    error::{CompositorError, Result},
    masks::MaskStore,
    monitor::Orchestrator,
    output::ResultWriter,
    state::{StateRecord, StateWatcher},
};
