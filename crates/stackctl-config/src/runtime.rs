//! Derives runtime artefact paths shared by every unit driver.
//!
//! The runtime directory houses one liveness record per self-spawned unit and
//! the run lock; the log directory houses one append-only log per unit. Both
//! are injected into the lifecycle crate so tests can point them at isolated
//! temporary directories.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Config;

const LOCK_FILE: &str = "stackctl.lock";

/// Canonical paths for runtime artefacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeLayout {
    runtime_dir: PathBuf,
    log_dir: PathBuf,
    lock_path: PathBuf,
}

impl RuntimeLayout {
    /// Derives the layout from configuration, creating both directories.
    pub fn from_config(config: &Config) -> Result<Self, RuntimePathsError> {
        let layout = Self::from_config_readonly(config);
        layout.ensure_directories()?;
        Ok(layout)
    }

    /// Derives the layout without touching the filesystem.
    #[must_use]
    pub fn from_config_readonly(config: &Config) -> Self {
        let runtime_dir = config.resolve(&config.runtime_dir).into_std_path_buf();
        let log_dir = config.resolve(&config.log_dir).into_std_path_buf();
        Self::new(runtime_dir, log_dir)
    }

    /// Builds a layout over explicit directories.
    #[must_use]
    pub fn new(runtime_dir: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        let runtime_dir = runtime_dir.into();
        Self {
            lock_path: runtime_dir.join(LOCK_FILE),
            runtime_dir,
            log_dir: log_dir.into(),
        }
    }

    /// Creates the runtime and log directories when missing.
    pub fn ensure_directories(&self) -> Result<(), RuntimePathsError> {
        for dir in [&self.runtime_dir, &self.log_dir] {
            fs::create_dir_all(dir).map_err(|source| RuntimePathsError::CreateDirectory {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Directory holding liveness records.
    #[must_use]
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// Directory holding unit logs.
    #[must_use]
    pub fn log_dir(&self) -> &Path {
        self.log_dir.as_path()
    }

    /// Path to the advisory lock serialising mutating runs.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        self.lock_path.as_path()
    }

    /// Liveness record for the named unit.
    #[must_use]
    pub fn record_path(&self, unit: &str) -> PathBuf {
        self.runtime_dir.join(format!("{unit}.pid"))
    }

    /// Log sink for the named unit.
    #[must_use]
    pub fn log_path(&self, unit: &str) -> PathBuf {
        self.log_dir.join(format!("{unit}.log"))
    }
}

/// Errors raised while preparing runtime directories.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// Creating a runtime or log directory failed.
    #[error("failed to prepare directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}
