//! # State Tracking
//!
//! Interprets the externally written state file naming the active
//! `<sequence>:<frame>`, or `none` when no sequence is active.

pub mod record;
pub mod watcher;

pub use record::{StateRecord, CLEARED_MARKERS};
pub use watcher::StateWatcher;
