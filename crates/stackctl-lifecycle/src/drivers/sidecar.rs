use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use super::{DRIVER_TARGET, StartFailure, StopFailure, UnitDriver};
use crate::command::{
    CommandError, CommandOutput, CommandRunner, Invocation, OutputMode, run_checked,
};
use crate::unit::{StartOutcome, StopOutcome, UnitDescriptor, UnitStatus};

/// How a sidecar tool is driven.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarSpec {
    /// Sidecar CLI exposing `start`, `stop` and `status`.
    pub program: String,
    /// Directory the CLI runs from.
    pub project_root: PathBuf,
    /// File whose presence proves the project was initialised.
    pub marker: PathBuf,
}

/// Drives a locally initialised tool through its own lifecycle commands.
pub struct SidecarDriver {
    descriptor: UnitDescriptor,
    spec: SidecarSpec,
    runner: Arc<dyn CommandRunner>,
}

impl SidecarDriver {
    /// Creates a driver issuing sidecar commands through `runner`.
    #[must_use]
    pub fn new(
        descriptor: UnitDescriptor,
        spec: SidecarSpec,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            descriptor,
            spec,
            runner,
        }
    }

    fn invocation(&self, subcommand: &str) -> Invocation {
        Invocation::new(self.spec.program.as_str())
            .arg(subcommand)
            .current_dir(self.spec.project_root.clone())
    }

    fn status(&self) -> io::Result<CommandOutput> {
        self.runner.run(&self.invocation("status"))
    }
}

impl UnitDriver for SidecarDriver {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn start(&self) -> Result<StartOutcome, StartFailure> {
        let unit = self.descriptor.name();
        let status = self.status().map_err(|source| CommandError::Launch {
            program: self.spec.program.clone(),
            source,
        })?;
        if status.success() {
            return Ok(StartOutcome::AlreadyRunning { pid: None });
        }
        if !self.spec.marker.exists() {
            return Err(StartFailure::NotInitialised {
                marker: self.spec.marker.clone(),
            });
        }
        info!(target: DRIVER_TARGET, unit, "starting sidecar attached");
        let start = self.invocation("start").output(OutputMode::Attached);
        run_checked(self.runner.as_ref(), &start)?;
        Ok(StartOutcome::Started { pid: None })
    }

    fn stop(&self) -> Result<StopOutcome, StopFailure> {
        let stop = self
            .invocation("stop")
            .output(OutputMode::AppendTo(self.descriptor.log_sink().to_path_buf()));
        run_checked(self.runner.as_ref(), &stop)?;
        info!(
            target: DRIVER_TARGET,
            unit = self.descriptor.name(),
            "sidecar stopped"
        );
        Ok(StopOutcome::Stopped)
    }

    fn probe(&self) -> UnitStatus {
        match self.status() {
            Ok(output) if output.success() => UnitStatus::Running,
            Ok(_) => UnitStatus::Stopped,
            Err(error) => {
                debug!(
                    target: DRIVER_TARGET,
                    unit = self.descriptor.name(),
                    error = %error,
                    "sidecar status unavailable"
                );
                UnitStatus::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitKind;
    use mockall::mock;
    use rstest::{fixture, rstest};
    use std::fs;
    use tempfile::TempDir;

    mock! {
        Runner {}
        impl CommandRunner for Runner {
            fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput>;
        }
    }

    fn is_subcommand(invocation: &Invocation, subcommand: &str) -> bool {
        invocation.arguments().first().map(String::as_str) == Some(subcommand)
    }

    struct Project {
        dir: TempDir,
    }

    impl Project {
        fn marker(&self) -> PathBuf {
            self.dir.path().join("supabase").join("config.toml")
        }

        fn initialise(&self) {
            fs::create_dir_all(self.dir.path().join("supabase")).expect("marker dir");
            fs::write(self.marker(), "").expect("marker");
        }

        fn driver(&self, runner: MockRunner) -> SidecarDriver {
            let descriptor = UnitDescriptor::new(
                "database",
                UnitKind::CliManagedSidecar,
                10,
                self.dir.path().join("database.log"),
            )
            .local_only();
            let spec = SidecarSpec {
                program: "supabase".to_owned(),
                project_root: self.dir.path().to_path_buf(),
                marker: self.marker(),
            };
            SidecarDriver::new(descriptor, spec, Arc::new(runner))
        }
    }

    #[fixture]
    fn project() -> Project {
        Project {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    #[rstest]
    fn start_is_a_no_op_when_status_succeeds(project: Project) {
        let mut runner = MockRunner::new();
        runner
            .expect_run()
            .withf(|invocation| is_subcommand(invocation, "status"))
            .times(1)
            .returning(|_| Ok(CommandOutput::exited(0)));
        let outcome = project.driver(runner).start().expect("start");
        assert_eq!(outcome, StartOutcome::AlreadyRunning { pid: None });
    }

    #[rstest]
    fn start_refuses_uninitialised_project(project: Project) {
        let mut runner = MockRunner::new();
        runner
            .expect_run()
            .withf(|invocation| is_subcommand(invocation, "status"))
            .returning(|_| Ok(CommandOutput::exited(1)));
        runner
            .expect_run()
            .withf(|invocation| is_subcommand(invocation, "start"))
            .never();
        let error = project.driver(runner).start().expect_err("not initialised");
        assert!(matches!(error, StartFailure::NotInitialised { .. }));
    }

    #[rstest]
    fn start_runs_attached(project: Project) {
        project.initialise();
        let mut runner = MockRunner::new();
        runner
            .expect_run()
            .withf(|invocation| is_subcommand(invocation, "status"))
            .returning(|_| Ok(CommandOutput::exited(1)));
        runner
            .expect_run()
            .withf(|invocation| {
                is_subcommand(invocation, "start")
                    && *invocation.output_mode() == OutputMode::Attached
            })
            .times(1)
            .returning(|_| Ok(CommandOutput::exited(0)));
        let outcome = project.driver(runner).start().expect("start");
        assert_eq!(outcome, StartOutcome::Started { pid: None });
    }

    #[rstest]
    fn start_fails_when_sidecar_start_fails(project: Project) {
        project.initialise();
        let mut runner = MockRunner::new();
        runner
            .expect_run()
            .withf(|invocation| is_subcommand(invocation, "status"))
            .returning(|_| Ok(CommandOutput::exited(1)));
        runner
            .expect_run()
            .withf(|invocation| is_subcommand(invocation, "start"))
            .returning(|_| Ok(CommandOutput::exited(1)));
        let error = project.driver(runner).start().expect_err("start failed");
        assert!(matches!(error, StartFailure::Command(CommandError::Failed { .. })));
    }

    #[rstest]
    fn stop_appends_to_log_sink(project: Project) {
        let log = project.dir.path().join("database.log");
        let mut runner = MockRunner::new();
        runner
            .expect_run()
            .withf(move |invocation| {
                is_subcommand(invocation, "stop")
                    && *invocation.output_mode() == OutputMode::AppendTo(log.clone())
            })
            .times(1)
            .returning(|_| Ok(CommandOutput::exited(0)));
        let outcome = project.driver(runner).stop().expect("stop");
        assert_eq!(outcome, StopOutcome::Stopped);
    }

    #[rstest]
    #[case(Ok(0), UnitStatus::Running)]
    #[case(Ok(1), UnitStatus::Stopped)]
    #[case(Err(io::ErrorKind::NotFound), UnitStatus::Unknown)]
    fn probe_maps_status_exit(
        project: Project,
        #[case] result: Result<i32, io::ErrorKind>,
        #[case] expected: UnitStatus,
    ) {
        let mut runner = MockRunner::new();
        runner.expect_run().returning(move |_| {
            result
                .map(CommandOutput::exited)
                .map_err(io::Error::from)
        });
        assert_eq!(project.driver(runner).probe(), expected);
    }
}
