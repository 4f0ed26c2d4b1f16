//! Ordered start, stop, restart and status across every configured unit.

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::catalog::CatalogError;
use crate::drivers::{StartFailure, StopFailure, UnitDriver};
use crate::mode::{ModeSource, OperatingMode};
use crate::status::{StatusEntry, StatusReport};
use crate::unit::{StartOutcome, StopOutcome, UnitDescriptor};

const ORCHESTRATOR_TARGET: &str = "stackctl::orchestrator";

/// Result of starting one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartEntry {
    /// Unit name.
    pub unit: String,
    /// What the start achieved.
    pub outcome: StartOutcome,
}

/// Every unit brought up by a successful start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    /// Operating mode resolved for the run.
    pub mode: OperatingMode,
    /// Units in the order they were started.
    pub started: Vec<StartEntry>,
    /// Local-only units left out because the backing store is remote.
    pub skipped: Vec<String>,
}

/// The first unit that failed to start; later units were not attempted.
#[derive(Debug, Error)]
#[error("failed to start {unit}: {failure}")]
pub struct StartAllError {
    /// Unit that failed.
    pub unit: String,
    /// Units started before the failure, which are left running.
    pub started: Vec<StartEntry>,
    /// Why the unit failed.
    #[source]
    pub failure: StartFailure,
}

/// Result of stopping one unit.
#[derive(Debug)]
pub struct StopEntry {
    /// Unit name.
    pub unit: String,
    /// Outcome, or the failure that was logged and swallowed.
    pub result: Result<StopOutcome, StopFailure>,
}

/// Outcome of stopping every configured unit.
#[derive(Debug, Default)]
pub struct StopReport {
    /// Units in the order they were stopped.
    pub entries: Vec<StopEntry>,
}

impl StopReport {
    /// Units whose stop reported a failure.
    pub fn failures(&self) -> impl Iterator<Item = &StopEntry> {
        self.entries.iter().filter(|entry| entry.result.is_err())
    }
}

/// Outcome of a stop followed by a start.
#[derive(Debug)]
pub struct RestartReport {
    /// Teardown phase.
    pub stop: StopReport,
    /// Startup phase; its result decides the restart's success.
    pub start: Result<StartReport, StartAllError>,
}

/// Owns the ordered unit drivers.
pub struct Orchestrator {
    units: Vec<Box<dyn UnitDriver>>,
    mode: Box<dyn ModeSource>,
    cooldown: Duration,
}

impl Orchestrator {
    /// Builds an orchestrator, sorting units by their startup order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when two units share a name or an order.
    pub fn new(
        mut units: Vec<Box<dyn UnitDriver>>,
        mode: Box<dyn ModeSource>,
        cooldown: Duration,
    ) -> Result<Self, CatalogError> {
        let mut names = HashSet::new();
        let mut orders = HashSet::new();
        for unit in &units {
            let descriptor = unit.descriptor();
            if !names.insert(descriptor.name().to_owned()) {
                return Err(CatalogError::DuplicateName {
                    name: descriptor.name().to_owned(),
                });
            }
            if !orders.insert(descriptor.order()) {
                return Err(CatalogError::DuplicateOrder {
                    order: descriptor.order(),
                });
            }
        }
        units.sort_by_key(|unit| unit.descriptor().order());
        Ok(Self {
            units,
            mode,
            cooldown,
        })
    }

    /// Descriptors in startup order.
    pub fn units(&self) -> impl Iterator<Item = &UnitDescriptor> {
        self.units.iter().map(|unit| unit.descriptor())
    }

    fn active(&self, mode: OperatingMode) -> impl Iterator<Item = &dyn UnitDriver> {
        self.units
            .iter()
            .map(|unit| &**unit)
            .filter(move |unit| mode.is_local() || !unit.descriptor().is_local_only())
    }

    /// Starts active units in ascending order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`StartAllError`] naming the first unit that failed.
    pub fn start_all(&self) -> Result<StartReport, StartAllError> {
        let mode = self.mode.resolve();
        info!(target: ORCHESTRATOR_TARGET, %mode, "starting units");
        let skipped = self
            .units()
            .filter(|descriptor| !mode.is_local() && descriptor.is_local_only())
            .map(|descriptor| descriptor.name().to_owned())
            .collect();

        let mut started = Vec::new();
        for unit in self.active(mode) {
            let name = unit.descriptor().name();
            match unit.start() {
                Ok(outcome) => {
                    info!(
                        target: ORCHESTRATOR_TARGET,
                        unit = name,
                        pid = outcome.pid(),
                        already_running = matches!(outcome, StartOutcome::AlreadyRunning { .. }),
                        "unit up"
                    );
                    started.push(StartEntry {
                        unit: name.to_owned(),
                        outcome,
                    });
                }
                Err(failure) => {
                    error!(
                        target: ORCHESTRATOR_TARGET,
                        unit = name,
                        error = %failure,
                        "unit failed to start; aborting"
                    );
                    return Err(StartAllError {
                        unit: name.to_owned(),
                        started,
                        failure,
                    });
                }
            }
        }
        Ok(StartReport {
            mode,
            started,
            skipped,
        })
    }

    /// Stops every configured unit in descending order, regardless of mode.
    ///
    /// Failures are logged and recorded; every unit is attempted.
    pub fn stop_all(&self) -> StopReport {
        info!(target: ORCHESTRATOR_TARGET, "stopping units");
        let entries = self
            .units
            .iter()
            .rev()
            .map(|unit| {
                let name = unit.descriptor().name();
                let result = unit.stop();
                match &result {
                    Ok(outcome) => info!(
                        target: ORCHESTRATOR_TARGET,
                        unit = name,
                        was_running = *outcome == StopOutcome::Stopped,
                        "unit down"
                    ),
                    Err(failure) => warn!(
                        target: ORCHESTRATOR_TARGET,
                        unit = name,
                        error = %failure,
                        "unit did not stop cleanly; continuing"
                    ),
                }
                StopEntry {
                    unit: name.to_owned(),
                    result,
                }
            })
            .collect();
        StopReport { entries }
    }

    /// Stops everything, waits for the cooldown, then starts again.
    pub fn restart_all(&self) -> RestartReport {
        let stop = self.stop_all();
        if !self.cooldown.is_zero() {
            info!(
                target: ORCHESTRATOR_TARGET,
                seconds = self.cooldown.as_secs_f32(),
                "cooling down before restart"
            );
            thread::sleep(self.cooldown);
        }
        let start = self.start_all();
        RestartReport { stop, start }
    }

    /// Probes every active unit without starting or stopping anything.
    pub fn status_all(&self) -> StatusReport {
        let mode = self.mode.resolve();
        let units = self
            .active(mode)
            .map(|unit| {
                let descriptor = unit.descriptor();
                StatusEntry {
                    unit: descriptor.name().to_owned(),
                    kind: descriptor.kind(),
                    status: unit.probe(),
                    pid: unit.tracked_pid(),
                }
            })
            .collect();
        StatusReport { mode, units }
    }
}
