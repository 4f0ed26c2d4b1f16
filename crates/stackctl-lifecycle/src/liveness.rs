//! Liveness records for self-spawned units.
//!
//! Each record is a single decimal PID followed by a newline. Reads verify the
//! PID against the process table and delete records whose process has gone,
//! so a record left behind by a crash never blocks a later start.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use stackctl_config::RuntimeLayout;
use thiserror::Error;
use tracing::{debug, info};

use crate::process::ProcessTable;
use crate::process::files::atomic_write;

const LIVENESS_TARGET: &str = "stackctl::liveness";

/// Errors raised while reading or writing liveness records.
#[derive(Debug, Error)]
pub enum LivenessError {
    /// The runtime directory could not be created.
    #[error("failed to create runtime directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The record exists but could not be read.
    #[error("failed to read liveness record '{path}': {source}")]
    Read {
        /// Record path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The record could not be written.
    #[error("failed to write liveness record '{path}': {source}")]
    Write {
        /// Record path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The record could not be removed.
    #[error("failed to remove liveness record '{path}': {source}")]
    Remove {
        /// Record path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Reads, verifies and repairs per-unit PID records.
#[derive(Clone)]
pub struct LivenessTracker {
    layout: RuntimeLayout,
    table: Arc<dyn ProcessTable>,
}

impl std::fmt::Debug for LivenessTracker {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("LivenessTracker")
            .field("runtime_dir", &self.layout.runtime_dir())
            .finish_non_exhaustive()
    }
}

impl LivenessTracker {
    /// Creates a tracker storing records under `layout`'s runtime directory.
    #[must_use]
    pub fn new(layout: RuntimeLayout, table: Arc<dyn ProcessTable>) -> Self {
        Self { layout, table }
    }

    /// Process table used for verification and signalling.
    #[must_use]
    pub fn table(&self) -> &dyn ProcessTable {
        self.table.as_ref()
    }

    /// Returns the recorded PID when its process is still alive.
    ///
    /// Records naming a dead or zombie process, and records that do not
    /// parse, are deleted before returning `None`.
    pub fn recorded_pid(&self, unit: &str) -> Result<Option<u32>, LivenessError> {
        let path = self.layout.record_path(unit);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(LivenessError::Read { path, source }),
        };

        let Ok(pid) = contents.trim().parse::<u32>() else {
            debug!(
                target: LIVENESS_TARGET,
                unit,
                file = %path.display(),
                "discarding unparseable liveness record"
            );
            self.clear(unit)?;
            return Ok(None);
        };

        if self.table.is_alive(pid) {
            return Ok(Some(pid));
        }
        debug!(
            target: LIVENESS_TARGET,
            unit,
            pid,
            "discarding stale liveness record"
        );
        self.clear(unit)?;
        Ok(None)
    }

    /// Returns true when the unit's recorded process is alive.
    pub fn is_alive(&self, unit: &str) -> Result<bool, LivenessError> {
        Ok(self.recorded_pid(unit)?.is_some())
    }

    /// Persists `pid` as the unit's liveness record.
    pub fn record(&self, unit: &str, pid: u32) -> Result<(), LivenessError> {
        let dir = self.layout.runtime_dir();
        fs::create_dir_all(dir).map_err(|source| LivenessError::CreateDirectory {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = self.layout.record_path(unit);
        atomic_write(&path, format!("{pid}\n").as_bytes())
            .map_err(|source| LivenessError::Write { path, source })?;
        info!(target: LIVENESS_TARGET, unit, pid, "liveness record written");
        Ok(())
    }

    /// Removes the unit's liveness record; a missing record is not an error.
    pub fn clear(&self, unit: &str) -> Result<(), LivenessError> {
        let path = self.layout.record_path(unit);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LivenessError::Remove { path, source }),
        }
    }
}
