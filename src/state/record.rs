use std::fmt;
use std::str::FromStr;

use crate::error::{CompositorError, Result, StateError};

/// Markers an external writer uses to clear the active sequence
pub const CLEARED_MARKERS: &[&str] = &["none", "-"];

/// Parsed content of the watched state file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateRecord {
    /// No sequence is active; only static masks are composed
    Cleared,

    /// Frame `frame` of sequence `sequence` is active
    Active { sequence: u32, frame: u32 },
}

impl StateRecord {
    /// Parse raw state file content
    ///
    /// The last non-empty line wins. Returns `Ok(None)` when the content is
    /// blank, which happens while an external writer is mid-rewrite.
    pub fn parse(content: &str) -> Result<Option<Self>> {
        match effective_line(content) {
            Some(line) => line.parse().map(Some),
            None => Ok(None),
        }
    }

    /// Reject sequence numbers above `max_sequence`
    pub fn validate(&self, max_sequence: u32) -> Result<()> {
        match *self {
            Self::Active { sequence, .. } if sequence > max_sequence => {
                Err(StateError::InvalidSequence { sequence, max: max_sequence }.into())
            }
            _ => Ok(()),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

impl FromStr for StateRecord {
    type Err = CompositorError;

    fn from_str(s: &str) -> Result<Self> {
        let line = s.trim();
        let format_error = || StateError::Format { content: line.to_string() };

        if CLEARED_MARKERS.iter().any(|m| line.eq_ignore_ascii_case(m)) {
            return Ok(Self::Cleared);
        }

        let (sequence, frame) = line.split_once(':').ok_or_else(format_error)?;
        let sequence = sequence.trim().parse().map_err(|_| format_error())?;
        let frame = frame.trim().parse().map_err(|_| format_error())?;

        Ok(Self::Active { sequence, frame })
    }
}

impl fmt::Display for StateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cleared => write!(f, "none"),
            Self::Active { sequence, frame } => write!(f, "{}:{}", sequence, frame),
        }
    }
}

fn effective_line(content: &str) -> Option<&str> {
    content.lines().rev().map(str::trim).find(|l| !l.is_empty())
}
