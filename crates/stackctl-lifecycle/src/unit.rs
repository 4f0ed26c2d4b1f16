//! Static unit descriptors and the values drivers report about them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

/// Mechanism through which a unit's lifecycle is controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Managed by a container engine; only commanded and queried here.
    ExternallyOrchestrated,
    /// A locally initialised tool exposing its own start/stop/status commands.
    CliManagedSidecar,
    /// Spawned by the supervisor and tracked through a liveness record.
    SelfSpawnedProcess,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ExternallyOrchestrated => "container",
            Self::CliManagedSidecar => "sidecar",
            Self::SelfSpawnedProcess => "process",
        };
        formatter.write_str(label)
    }
}

/// Immutable description of one managed service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDescriptor {
    name: String,
    kind: UnitKind,
    order: u32,
    startup_grace: Duration,
    log_sink: PathBuf,
    local_only: bool,
}

impl UnitDescriptor {
    /// Builds a descriptor with no grace period that always participates.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: UnitKind,
        order: u32,
        log_sink: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            order,
            startup_grace: Duration::ZERO,
            log_sink: log_sink.into(),
            local_only: false,
        }
    }

    /// Sets the wait budget applied after spawning.
    #[must_use]
    pub const fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    /// Restricts the unit to runs where the backing store is local.
    #[must_use]
    pub const fn local_only(mut self) -> Self {
        self.local_only = true;
        self
    }

    /// Unique unit name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Lifecycle mechanism.
    #[must_use]
    pub const fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Position in the startup sequence; shutdown runs in reverse.
    #[must_use]
    pub const fn order(&self) -> u32 {
        self.order
    }

    /// Wait budget after spawn before declaring success.
    #[must_use]
    pub const fn startup_grace(&self) -> Duration {
        self.startup_grace
    }

    /// Append-only destination for the unit's output.
    #[must_use]
    pub fn log_sink(&self) -> &Path {
        self.log_sink.as_path()
    }

    /// Whether the unit only participates when the backing store is local.
    #[must_use]
    pub const fn is_local_only(&self) -> bool {
        self.local_only
    }
}

/// Observed state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// The unit is up.
    Running,
    /// The unit is down.
    Stopped,
    /// The probe itself could not be answered.
    Unknown,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        };
        formatter.write_str(label)
    }
}

/// Successful result of starting a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The unit was brought up by this call.
    Started {
        /// Process identifier when the unit is PID-tracked.
        pid: Option<u32>,
    },
    /// The unit was already up; nothing was launched.
    AlreadyRunning {
        /// Process identifier when the unit is PID-tracked.
        pid: Option<u32>,
    },
}

impl StartOutcome {
    /// Process identifier attached to the outcome, if any.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        match self {
            Self::Started { pid } | Self::AlreadyRunning { pid } => *pid,
        }
    }
}

/// Successful result of stopping a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The unit was brought down by this call.
    Stopped,
    /// The unit was already down.
    NotRunning,
}
