use std::path::PathBuf;
use std::process::Child;
use std::thread;
use std::time::{Duration, Instant};

use stackctl_config::CommandLine;
use tracing::{debug, info, warn};

use super::{DEFAULT_POLL_INTERVAL, DRIVER_TARGET, StartFailure, StopFailure, UnitDriver};
use crate::liveness::LivenessTracker;
use crate::process::spawn::{open_log_sink, spawn_detached};
use crate::process::{ProcessTable, Termination};
use crate::unit::{StartOutcome, StopOutcome, UnitDescriptor, UnitStatus};

/// Time allowed for the kernel to tear down processes after `SIGKILL`.
const KILL_SETTLE: Duration = Duration::from_secs(1);

/// Which processes receive termination signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationScope {
    /// Only the recorded process.
    Process,
    /// The recorded process and every descendant, deepest first.
    Tree,
}

/// How a self-spawned unit is launched and stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Command to launch.
    pub command: CommandLine,
    /// Working directory for the command.
    pub working_dir: PathBuf,
    /// How long to wait after `SIGTERM` before escalating.
    pub stop_timeout: Duration,
    /// Which processes are signalled on stop.
    pub scope: TerminationScope,
}

/// Spawns a unit detached and tracks it through a liveness record.
pub struct ProcessDriver {
    descriptor: UnitDescriptor,
    spec: ProcessSpec,
    tracker: LivenessTracker,
    poll_interval: Duration,
}

impl ProcessDriver {
    /// Creates a driver recording liveness through `tracker`.
    #[must_use]
    pub fn new(descriptor: UnitDescriptor, spec: ProcessSpec, tracker: LivenessTracker) -> Self {
        Self {
            descriptor,
            spec,
            tracker,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the grace and shutdown poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Watches the child for the whole grace window, failing as soon as it
    /// exits.
    fn observe_grace(&self, child: &mut Child) -> Result<(), StartFailure> {
        let pid = child.id();
        let deadline = Instant::now() + self.descriptor.startup_grace();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Err(StartFailure::ExitedDuringGrace { status }),
                Ok(None) => {}
                Err(source) => return Err(StartFailure::Monitor { pid, source }),
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    fn wait_until_gone(
        &self,
        table: &dyn ProcessTable,
        pids: &[u32],
        timeout: Duration,
    ) -> Vec<u32> {
        let deadline = Instant::now() + timeout;
        loop {
            let survivors: Vec<u32> = pids
                .iter()
                .copied()
                .filter(|&pid| table.is_alive(pid))
                .collect();
            let now = Instant::now();
            if survivors.is_empty() || now >= deadline {
                return survivors;
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    fn signal_all(&self, table: &dyn ProcessTable, pids: &[u32], termination: Termination) {
        let unit = self.descriptor.name();
        for &pid in pids {
            if let Err(error) = table.signal(pid, termination) {
                debug!(
                    target: DRIVER_TARGET,
                    unit,
                    pid,
                    signal = %termination,
                    error = %error,
                    "signal not delivered"
                );
            }
        }
    }
}

impl UnitDriver for ProcessDriver {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn start(&self) -> Result<StartOutcome, StartFailure> {
        let unit = self.descriptor.name();
        if let Some(pid) = self.tracker.recorded_pid(unit)? {
            return Ok(StartOutcome::AlreadyRunning { pid: Some(pid) });
        }

        let log_sink = self.descriptor.log_sink();
        let log = open_log_sink(log_sink).map_err(|source| StartFailure::LogSink {
            path: log_sink.to_path_buf(),
            source,
        })?;
        let mut child = spawn_detached(&self.spec.command, &self.spec.working_dir, log)
            .map_err(|source| StartFailure::Spawn {
                command: self.spec.command.to_string(),
                source,
            })?;
        let pid = child.id();
        info!(
            target: DRIVER_TARGET,
            unit,
            pid,
            command = %self.spec.command,
            "spawned process"
        );

        if let Err(error) = self.tracker.record(unit, pid) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(error.into());
        }

        if let Err(failure) = self.observe_grace(&mut child) {
            if let Err(error) = self.tracker.clear(unit) {
                warn!(
                    target: DRIVER_TARGET,
                    unit,
                    error = %error,
                    "failed to clear liveness record"
                );
            }
            return Err(failure);
        }
        Ok(StartOutcome::Started { pid: Some(pid) })
    }

    fn stop(&self) -> Result<StopOutcome, StopFailure> {
        let unit = self.descriptor.name();
        let Some(pid) = self.tracker.recorded_pid(unit)? else {
            return Ok(StopOutcome::NotRunning);
        };
        let table = self.tracker.table();

        // Capture the tree before signalling; children are re-parented once
        // the root exits.
        let mut targets = match self.spec.scope {
            TerminationScope::Tree => table.descendants(pid),
            TerminationScope::Process => Vec::new(),
        };
        targets.push(pid);

        info!(
            target: DRIVER_TARGET,
            unit,
            pid,
            processes = targets.len(),
            "sending SIGTERM"
        );
        self.signal_all(table, &targets, Termination::Graceful);
        let survivors = self.wait_until_gone(table, &targets, self.spec.stop_timeout);

        let mut result = Ok(StopOutcome::Stopped);
        if !survivors.is_empty() {
            warn!(
                target: DRIVER_TARGET,
                unit,
                survivors = ?survivors,
                "processes ignored SIGTERM; sending SIGKILL"
            );
            self.signal_all(table, &survivors, Termination::Forceful);
            let remaining = self.wait_until_gone(table, &survivors, KILL_SETTLE);
            if remaining.contains(&pid) {
                result = Err(StopFailure::Survived { pid });
            }
        }

        self.tracker.clear(unit)?;
        result
    }

    fn probe(&self) -> UnitStatus {
        match self.tracker.is_alive(self.descriptor.name()) {
            Ok(true) => UnitStatus::Running,
            Ok(false) => UnitStatus::Stopped,
            Err(error) => {
                debug!(
                    target: DRIVER_TARGET,
                    unit = self.descriptor.name(),
                    error = %error,
                    "liveness record unreadable"
                );
                UnitStatus::Unknown
            }
        }
    }

    fn tracked_pid(&self) -> Option<u32> {
        self.tracker
            .recorded_pid(self.descriptor.name())
            .ok()
            .flatten()
    }
}
