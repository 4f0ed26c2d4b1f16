//! Scripted drivers and mode sources for orchestration scenarios.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::command::CommandError;
use crate::drivers::{StartFailure, StopFailure, UnitDriver};
use crate::mode::{ModeSource, OperatingMode};
use crate::orchestrator::Orchestrator;
use crate::unit::{StartOutcome, StopOutcome, UnitDescriptor, UnitKind, UnitStatus};

/// Ordered record of lifecycle calls, shared by every scripted driver.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: String) {
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(entry);
    }

    /// Every entry in call order.
    pub fn entries(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Unit names recorded for `action` (`start` or `stop`), in call order.
    pub fn units_for(&self, action: &str) -> Vec<String> {
        let prefix = format!("{action}:");
        self.entries()
            .into_iter()
            .filter_map(|entry| entry.strip_prefix(&prefix).map(str::to_owned))
            .collect()
    }
}

/// Driver whose behaviour is fixed up front and whose calls are journalled.
pub struct ScriptedDriver {
    descriptor: UnitDescriptor,
    journal: Journal,
    running: AtomicBool,
    fail_start: bool,
    fail_stop: bool,
}

impl ScriptedDriver {
    pub fn new(descriptor: UnitDescriptor, journal: Journal) -> Self {
        Self {
            descriptor,
            journal,
            running: AtomicBool::new(false),
            fail_start: false,
            fail_stop: false,
        }
    }

    pub fn failing_start(mut self, fail: bool) -> Self {
        self.fail_start = fail;
        self
    }

    pub fn failing_stop(mut self, fail: bool) -> Self {
        self.fail_stop = fail;
        self
    }

    fn scripted_failure(&self, action: &str) -> CommandError {
        CommandError::Failed {
            command: format!("{} {action}", self.descriptor.name()),
            code: Some(1),
        }
    }
}

impl UnitDriver for ScriptedDriver {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn start(&self) -> Result<StartOutcome, StartFailure> {
        self.journal
            .push(format!("start:{}", self.descriptor.name()));
        if self.fail_start {
            return Err(self.scripted_failure("start").into());
        }
        if self.running.swap(true, Ordering::SeqCst) {
            Ok(StartOutcome::AlreadyRunning { pid: None })
        } else {
            Ok(StartOutcome::Started { pid: None })
        }
    }

    fn stop(&self) -> Result<StopOutcome, StopFailure> {
        self.journal.push(format!("stop:{}", self.descriptor.name()));
        if self.fail_stop {
            return Err(self.scripted_failure("stop").into());
        }
        if self.running.swap(false, Ordering::SeqCst) {
            Ok(StopOutcome::Stopped)
        } else {
            Ok(StopOutcome::NotRunning)
        }
    }

    fn probe(&self) -> UnitStatus {
        if self.running.load(Ordering::SeqCst) {
            UnitStatus::Running
        } else {
            UnitStatus::Stopped
        }
    }
}

/// Mode source returning a fixed answer.
pub struct FixedMode(pub OperatingMode);

impl ModeSource for FixedMode {
    fn resolve(&self) -> OperatingMode {
        self.0
    }
}

/// Builds the five-unit stack with scripted drivers.
pub fn scripted_stack(
    journal: &Journal,
    mode: OperatingMode,
    failing_start: &[String],
    failing_stop: &[String],
) -> Orchestrator {
    let layout = [
        ("database", UnitKind::CliManagedSidecar, 10),
        ("cache", UnitKind::ExternallyOrchestrated, 20),
        ("api", UnitKind::SelfSpawnedProcess, 30),
        ("worker", UnitKind::SelfSpawnedProcess, 40),
        ("frontend", UnitKind::SelfSpawnedProcess, 50),
    ];
    let units: Vec<Box<dyn UnitDriver>> = layout
        .into_iter()
        .map(|(name, kind, order)| {
            let mut descriptor = UnitDescriptor::new(name, kind, order, format!("{name}.log"));
            if kind == UnitKind::CliManagedSidecar {
                descriptor = descriptor.local_only();
            }
            let driver = ScriptedDriver::new(descriptor, journal.clone())
                .failing_start(failing_start.iter().any(|unit| unit == name))
                .failing_stop(failing_stop.iter().any(|unit| unit == name));
            Box::new(driver) as Box<dyn UnitDriver>
        })
        .collect();
    match Orchestrator::new(units, Box::new(FixedMode(mode)), Duration::ZERO) {
        Ok(orchestrator) => orchestrator,
        Err(error) => panic!("scripted stack is inconsistent: {error}"),
    }
}
