//! # Result Output
//!
//! Atomic, sequentially numbered persistence of composed mask images.

pub mod writer;

pub use writer::{output_number, ResultWriter, OUTPUT_EXTENSION};
