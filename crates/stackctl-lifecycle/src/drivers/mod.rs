//! Per-kind lifecycle drivers.
//!
//! A driver owns one unit: it starts it idempotently, stops it
//! best-effort and probes it without side effects beyond liveness repair.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use crate::command::CommandError;
use crate::liveness::LivenessError;
use crate::unit::{StartOutcome, StopOutcome, UnitDescriptor, UnitStatus};

mod container;
mod process;
mod sidecar;

pub use container::{ContainerDriver, ContainerSpec};
pub use process::{ProcessDriver, ProcessSpec, TerminationScope};
pub use sidecar::{SidecarDriver, SidecarSpec};

pub(crate) const DRIVER_TARGET: &str = "stackctl::driver";

/// Interval between readiness and shutdown polls.
pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle control for one unit.
pub trait UnitDriver: Send {
    /// Static description of the unit.
    fn descriptor(&self) -> &UnitDescriptor;

    /// Brings the unit up unless it is already running.
    fn start(&self) -> Result<StartOutcome, StartFailure>;

    /// Brings the unit down; stopping a stopped unit succeeds.
    fn stop(&self) -> Result<StopOutcome, StopFailure>;

    /// Reports the unit's current state.
    fn probe(&self) -> UnitStatus;

    /// Live process identifier for PID-tracked units.
    fn tracked_pid(&self) -> Option<u32> {
        None
    }
}

/// Reasons a unit failed to start.
#[derive(Debug, Error)]
pub enum StartFailure {
    /// The sidecar project has not been initialised.
    #[error("project is not initialised: '{marker}' is missing")]
    NotInitialised {
        /// Marker file that was expected.
        marker: PathBuf,
    },
    /// An external command could not be run or reported failure.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// The container never reported running within the settle period.
    #[error("container '{container}' was not running after {}s", .waited.as_secs())]
    NotReady {
        /// Container name.
        container: String,
        /// Time spent waiting.
        waited: Duration,
    },
    /// The unit's log sink could not be opened.
    #[error("failed to open log sink '{path}': {source}")]
    LogSink {
        /// Log sink path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The unit's command could not be spawned.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The process exited before its grace period elapsed.
    #[error("process exited during startup grace period ({status})")]
    ExitedDuringGrace {
        /// Exit status reported by the process.
        status: ExitStatus,
    },
    /// Waiting on the spawned process failed.
    #[error("failed to monitor spawned process {pid}: {source}")]
    Monitor {
        /// Spawned process identifier.
        pid: u32,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The liveness record could not be read or written.
    #[error(transparent)]
    Liveness(#[from] LivenessError),
}

/// Reasons a unit failed to stop cleanly.
#[derive(Debug, Error)]
pub enum StopFailure {
    /// An external command could not be run or reported failure.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// The liveness record could not be read or removed.
    #[error(transparent)]
    Liveness(#[from] LivenessError),
    /// The process was still alive after a forceful kill.
    #[error("process {pid} survived SIGKILL")]
    Survived {
        /// Surviving process identifier.
        pid: u32,
    },
}
