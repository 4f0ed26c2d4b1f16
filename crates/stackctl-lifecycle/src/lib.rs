//! Service lifecycle orchestration for `stackctl`.
//!
//! The crate decides what to start, in what order, how to tell whether a
//! unit is already alive, how to escalate termination when a unit ignores a
//! graceful signal, and how to aggregate status across three kinds of unit:
//!
//! - containers managed through an engine CLI ([`ContainerDriver`]),
//! - a sidecar tool with its own lifecycle commands ([`SidecarDriver`]),
//! - processes spawned and PID-tracked here ([`ProcessDriver`]).
//!
//! Every driver implements [`UnitDriver`]. The [`Orchestrator`] owns the
//! ordered driver list: startup is fail-fast in ascending order, shutdown is
//! best-effort in descending order, and status probes every active unit
//! without side effects. [`build_orchestrator`] assembles the built-in unit
//! catalogue from a resolved [`stackctl_config::Config`].
//!
//! Execution is single-threaded and blocking. Mutating runs are serialised
//! across processes by a [`RunLock`].

mod catalog;
mod command;
mod drivers;
mod liveness;
mod lock;
mod mode;
mod orchestrator;
mod process;
mod status;
mod unit;

pub use catalog::{CatalogError, build_orchestrator, build_orchestrator_with};
pub use command::{
    CommandError, CommandOutput, CommandRunner, Invocation, OutputMode, SystemCommandRunner,
};
pub use drivers::{
    ContainerDriver, ContainerSpec, ProcessDriver, ProcessSpec, SidecarDriver, SidecarSpec,
    StartFailure, StopFailure, TerminationScope, UnitDriver,
};
pub use liveness::{LivenessError, LivenessTracker};
pub use lock::{LockError, RunLock};
pub use mode::{EnvFileModeResolver, ModeSource, OperatingMode};
pub use orchestrator::{
    Orchestrator, RestartReport, StartAllError, StartEntry, StartReport, StopEntry, StopReport,
};
pub use process::{ProcessTable, SystemProcessTable, Termination};
pub use status::{StatusEntry, StatusReport};
pub use unit::{StartOutcome, StopOutcome, UnitDescriptor, UnitKind, UnitStatus};

#[cfg(test)]
mod tests;
