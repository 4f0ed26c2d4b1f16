use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{DEFAULT_POLL_INTERVAL, DRIVER_TARGET, StartFailure, StopFailure, UnitDriver};
use crate::command::{CommandError, CommandRunner, Invocation, run_checked};
use crate::unit::{StartOutcome, StopOutcome, UnitDescriptor, UnitStatus};

/// Label attached to every container this supervisor creates.
const UNIT_LABEL: &str = "io.stackctl.unit";

/// How a container unit is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container engine CLI, e.g. `docker` or `podman`.
    pub engine: String,
    /// Exact container name.
    pub container: String,
    /// Image to run.
    pub image: String,
    /// Port publications passed as `-p` arguments.
    pub ports: Vec<String>,
    /// How long to wait for the container to report running.
    pub settle: Duration,
}

/// Drives a unit through a container engine CLI.
pub struct ContainerDriver {
    descriptor: UnitDescriptor,
    spec: ContainerSpec,
    runner: Arc<dyn CommandRunner>,
    poll_interval: Duration,
}

impl ContainerDriver {
    /// Creates a driver issuing engine commands through `runner`.
    #[must_use]
    pub fn new(
        descriptor: UnitDescriptor,
        spec: ContainerSpec,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            descriptor,
            spec,
            runner,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the readiness poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn label(&self) -> String {
        format!("{UNIT_LABEL}={}", self.descriptor.name())
    }

    fn engine(&self) -> Invocation {
        Invocation::new(self.spec.engine.as_str())
    }

    /// Returns true when a running container carries this unit's label and
    /// exact name.
    fn is_running(&self) -> Result<bool, CommandError> {
        let invocation = self.engine().args([
            "ps".to_owned(),
            "--filter".to_owned(),
            format!("label={}", self.label()),
            "--filter".to_owned(),
            "status=running".to_owned(),
            "--format".to_owned(),
            "{{.Names}}".to_owned(),
        ]);
        let output = run_checked(self.runner.as_ref(), &invocation)?;
        Ok(output
            .stdout
            .lines()
            .any(|line| line.trim() == self.spec.container))
    }

    fn remove(&self) -> Result<(), CommandError> {
        let invocation = self
            .engine()
            .args(["rm", "-f", self.spec.container.as_str()]);
        run_checked(self.runner.as_ref(), &invocation).map(|_| ())
    }

    fn launch(&self) -> Result<(), CommandError> {
        let mut invocation = self.engine().args([
            "run".to_owned(),
            "-d".to_owned(),
            "--name".to_owned(),
            self.spec.container.clone(),
            "--label".to_owned(),
            self.label(),
        ]);
        for port in &self.spec.ports {
            invocation = invocation.arg("-p").arg(port.as_str());
        }
        invocation = invocation.arg(self.spec.image.as_str());
        run_checked(self.runner.as_ref(), &invocation).map(|_| ())
    }

    fn await_running(&self) -> Result<(), StartFailure> {
        let started = Instant::now();
        let deadline = started + self.spec.settle;
        loop {
            if matches!(self.is_running(), Ok(true)) {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(StartFailure::NotReady {
                    container: self.spec.container.clone(),
                    waited: now.duration_since(started),
                });
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }
}

impl UnitDriver for ContainerDriver {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn start(&self) -> Result<StartOutcome, StartFailure> {
        let unit = self.descriptor.name();
        if self.is_running()? {
            return Ok(StartOutcome::AlreadyRunning { pid: None });
        }
        if let Err(error) = self.remove() {
            debug!(
                target: DRIVER_TARGET,
                unit,
                error = %error,
                "no stale container removed"
            );
        }
        self.launch()?;
        self.await_running()?;
        info!(
            target: DRIVER_TARGET,
            unit,
            container = %self.spec.container,
            "container running"
        );
        Ok(StartOutcome::Started { pid: None })
    }

    fn stop(&self) -> Result<StopOutcome, StopFailure> {
        let unit = self.descriptor.name();
        let running = match self.is_running() {
            Ok(running) => running,
            Err(error) => {
                warn!(
                    target: DRIVER_TARGET,
                    unit,
                    error = %error,
                    "container query failed; removing anyway"
                );
                true
            }
        };
        if !running {
            // Clear out an exited container so the next start can reuse the name.
            if let Err(error) = self.remove() {
                debug!(target: DRIVER_TARGET, unit, error = %error, "nothing to remove");
            }
            return Ok(StopOutcome::NotRunning);
        }
        self.remove()?;
        info!(
            target: DRIVER_TARGET,
            unit,
            container = %self.spec.container,
            "container removed"
        );
        Ok(StopOutcome::Stopped)
    }

    fn probe(&self) -> UnitStatus {
        match self.is_running() {
            Ok(true) => UnitStatus::Running,
            Ok(false) => UnitStatus::Stopped,
            Err(error) => {
                debug!(
                    target: DRIVER_TARGET,
                    unit = self.descriptor.name(),
                    error = %error,
                    "container probe failed"
                );
                UnitStatus::Unknown
            }
        }
    }
}
