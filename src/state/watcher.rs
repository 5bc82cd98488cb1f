use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::Result;
use crate::state::record::StateRecord;

/// Polls the externally written state file for changes
///
/// Each [`poll`](Self::poll) reads the whole file. Identical bytes are a no-op,
/// and so is content that parses to the record already in effect. Blank
/// content is treated as a rewrite in progress and re-read on the next poll.
/// Rejected content (malformed or out of range) is reported once and leaves
/// the current record untouched. A read error that keeps recurring is
/// likewise reported once, until a read succeeds again.
#[derive(Debug)]
pub struct StateWatcher {
    path: PathBuf,
    max_sequence: u32,
    last_content: Option<Vec<u8>>,
    last_error: Option<ErrorKind>,
    current: Option<StateRecord>,
}

impl StateWatcher {
    pub fn new<P: Into<PathBuf>>(path: P, max_sequence: u32) -> Self {
        Self {
            path: path.into(),
            max_sequence,
            last_content: None,
            last_error: None,
            current: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record currently in effect, if any state was ever accepted
    pub fn current(&self) -> Option<StateRecord> {
        self.current
    }

    /// Read the state file and return a record only when it changed
    pub fn poll(&mut self) -> Result<Option<StateRecord>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!("State file {:?} does not exist yet", self.path);
                self.last_error = None;
                return Ok(None);
            }
            Err(e) if self.last_error == Some(e.kind()) => {
                trace!("State file {:?} still unreadable: {}", self.path, e);
                return Ok(None);
            }
            Err(e) => {
                self.last_error = Some(e.kind());
                return Err(e.into());
            }
        };
        self.last_error = None;

        if self.last_content.as_deref() == Some(bytes.as_slice()) {
            return Ok(None);
        }

        let content = String::from_utf8_lossy(&bytes);
        let parsed = StateRecord::parse(&content);

        if let Ok(None) = parsed {
            debug!("State file is blank, waiting for the writer to finish");
            return Ok(None);
        }

        // Remember the bytes even when they are rejected so that a bad write
        // is reported once, not on every poll
        self.last_content = Some(bytes);

        let Some(record) = parsed? else {
            return Ok(None);
        };
        record.validate(self.max_sequence)?;

        if self.current == Some(record) {
            trace!("State content changed but still parses to {}", record);
            return Ok(None);
        }

        debug!("State changed: {:?} -> {}", self.current, record);
        self.current = Some(record);
        Ok(Some(record))
    }
}
