//! # Monitoring Loop
//!
//! Ties the state watcher, compositor and result writer together into the
//! long-running poll loop.

pub mod orchestrator;

pub use orchestrator::{LoopStats, Orchestrator, Phase, TickOutcome};
