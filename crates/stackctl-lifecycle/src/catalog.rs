//! The built-in unit catalogue.
//!
//! | unit     | kind      | order | participates        |
//! |----------|-----------|-------|---------------------|
//! | database | sidecar   | 10    | local backing store |
//! | cache    | container | 20    | always              |
//! | api      | process   | 30    | always              |
//! | worker   | process   | 40    | always              |
//! | frontend | process   | 50    | always (tree stop)  |

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;
use stackctl_config::{CommandLine, Config, RuntimeLayout};
use thiserror::Error;

use crate::command::{CommandRunner, SystemCommandRunner};
use crate::drivers::{
    ContainerDriver, ContainerSpec, ProcessDriver, ProcessSpec, SidecarDriver, SidecarSpec,
    TerminationScope, UnitDriver,
};
use crate::liveness::LivenessTracker;
use crate::mode::EnvFileModeResolver;
use crate::orchestrator::Orchestrator;
use crate::process::{ProcessTable, SystemProcessTable};
use crate::unit::{UnitDescriptor, UnitKind};

const DATABASE: &str = "database";
const CACHE: &str = "cache";
const API: &str = "api";
const WORKER: &str = "worker";
const FRONTEND: &str = "frontend";

/// Errors raised while assembling the unit catalogue.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Two units share a name.
    #[error("duplicate unit name '{name}'")]
    DuplicateName {
        /// Repeated name.
        name: String,
    },
    /// Two units share a startup position.
    #[error("duplicate unit order {order}")]
    DuplicateOrder {
        /// Repeated order.
        order: u32,
    },
}

/// Builds the orchestrator for the built-in units against the host system.
///
/// # Errors
///
/// Returns [`CatalogError`] if the catalogue is inconsistent.
pub fn build_orchestrator(
    config: &Config,
    layout: &RuntimeLayout,
) -> Result<Orchestrator, CatalogError> {
    build_orchestrator_with(
        config,
        layout,
        Arc::new(SystemCommandRunner),
        Arc::new(SystemProcessTable::new()),
    )
}

/// Builds the orchestrator with injected command and process seams.
///
/// # Errors
///
/// Returns [`CatalogError`] if the catalogue is inconsistent.
pub fn build_orchestrator_with(
    config: &Config,
    layout: &RuntimeLayout,
    runner: Arc<dyn CommandRunner>,
    table: Arc<dyn ProcessTable>,
) -> Result<Orchestrator, CatalogError> {
    let tracker = LivenessTracker::new(layout.clone(), table);
    let stop_timeout = Duration::from_secs(config.stop_timeout_seconds);

    let database = SidecarDriver::new(
        UnitDescriptor::new(
            DATABASE,
            UnitKind::CliManagedSidecar,
            10,
            layout.log_path(DATABASE),
        )
        .local_only(),
        SidecarSpec {
            program: config.sidecar_program.clone(),
            project_root: config.project_root.clone().into_std_path_buf(),
            marker: config.sidecar_marker_path().into_std_path_buf(),
        },
        Arc::clone(&runner),
    );

    let cache = ContainerDriver::new(
        UnitDescriptor::new(
            CACHE,
            UnitKind::ExternallyOrchestrated,
            20,
            layout.log_path(CACHE),
        ),
        ContainerSpec {
            engine: config.container_engine.clone(),
            container: config.cache_container.clone(),
            image: config.cache_image.clone(),
            ports: split_ports(&config.cache_ports),
            settle: Duration::from_secs(config.container_settle_seconds),
        },
        runner,
    );

    let process = |name: &str,
                   order: u32,
                   grace: u64,
                   command: &CommandLine,
                   dir: &Utf8Path,
                   scope: TerminationScope| {
        ProcessDriver::new(
            UnitDescriptor::new(name, UnitKind::SelfSpawnedProcess, order, layout.log_path(name))
                .with_startup_grace(Duration::from_secs(grace)),
            ProcessSpec {
                command: command.clone(),
                working_dir: config.resolve(dir).into_std_path_buf(),
                stop_timeout,
                scope,
            },
            tracker.clone(),
        )
    };

    let units: Vec<Box<dyn UnitDriver>> = vec![
        Box::new(database),
        Box::new(cache),
        Box::new(process(
            API,
            30,
            config.api_grace_seconds,
            &config.api_command,
            &config.api_dir,
            TerminationScope::Process,
        )),
        Box::new(process(
            WORKER,
            40,
            config.worker_grace_seconds,
            &config.worker_command,
            &config.worker_dir,
            TerminationScope::Process,
        )),
        Box::new(process(
            FRONTEND,
            50,
            config.frontend_grace_seconds,
            &config.frontend_command,
            &config.frontend_dir,
            TerminationScope::Tree,
        )),
    ];

    let mode = EnvFileModeResolver::new(
        config.env_file_path().into_std_path_buf(),
        config.backing_store_key.clone(),
    );
    Orchestrator::new(
        units,
        Box::new(mode),
        Duration::from_secs(config.restart_cooldown_seconds),
    )
}

fn split_ports(ports: &str) -> Vec<String> {
    ports
        .split(',')
        .map(str::trim)
        .filter(|port| !port.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, Invocation};
    use crate::mode::OperatingMode;
    use crate::process::Termination;
    use crate::unit::UnitStatus;
    use camino::Utf8PathBuf;
    use mockall::mock;
    use rstest::rstest;
    use std::fs;
    use std::io;
    use tempfile::TempDir;

    mock! {
        Runner {}
        impl CommandRunner for Runner {
            fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput>;
        }
    }

    mock! {
        Table {}
        impl ProcessTable for Table {
            fn is_alive(&self, pid: u32) -> bool;
            fn descendants(&self, pid: u32) -> Vec<u32>;
            fn signal(&self, pid: u32, termination: Termination) -> io::Result<()>;
        }
    }

    fn project_config(dir: &TempDir) -> Config {
        Config {
            project_root: Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
                .expect("utf-8 temp dir"),
            ..Config::default()
        }
    }

    #[rstest]
    #[case("6379:6379", vec!["6379:6379"])]
    #[case("6379:6379, 8001:8001", vec!["6379:6379", "8001:8001"])]
    #[case("", Vec::new())]
    #[case(" , ", Vec::new())]
    fn splits_port_list(#[case] input: &str, #[case] expected: Vec<&str>) {
        assert_eq!(split_ports(input), expected);
    }

    #[test]
    fn catalogue_lists_units_in_order() {
        let dir = TempDir::new().expect("temp dir");
        let config = project_config(&dir);
        let layout = RuntimeLayout::from_config_readonly(&config);
        let orchestrator = build_orchestrator(&config, &layout).expect("catalogue");

        let names: Vec<&str> = orchestrator.units().map(UnitDescriptor::name).collect();
        assert_eq!(names, [DATABASE, CACHE, API, WORKER, FRONTEND]);

        let local_only: Vec<&str> = orchestrator
            .units()
            .filter(|unit| unit.is_local_only())
            .map(UnitDescriptor::name)
            .collect();
        assert_eq!(local_only, [DATABASE]);

        let api = orchestrator
            .units()
            .find(|unit| unit.name() == API)
            .expect("api unit");
        assert_eq!(api.startup_grace(), Duration::from_secs(3));
        assert_eq!(api.log_sink(), layout.log_path(API));
    }

    #[test]
    fn injected_seams_back_every_unit() {
        let dir = TempDir::new().expect("temp dir");
        let config = project_config(&dir);
        fs::create_dir_all(dir.path().join("backend")).expect("backend dir");
        fs::write(
            dir.path().join("backend").join(".env"),
            "SUPABASE_URL=http://localhost:54321\n",
        )
        .expect("env file");
        let layout = RuntimeLayout::from_config(&config).expect("layout");
        fs::write(layout.record_path(API), "4242\n").expect("api record");

        let mut runner = MockRunner::new();
        runner.expect_run().returning(|invocation: &Invocation| {
            let subcommand = invocation.arguments().first().map(String::as_str);
            match (invocation.program(), subcommand) {
                ("supabase", Some("status")) => Ok(CommandOutput::exited(0)),
                ("docker", Some("ps")) => Ok(CommandOutput::success_with("stackctl-redis\n")),
                (program, _) => Err(io::Error::new(io::ErrorKind::NotFound, program.to_owned())),
            }
        });
        let mut table = MockTable::new();
        table.expect_is_alive().returning(|pid| pid == 4242);

        let orchestrator =
            build_orchestrator_with(&config, &layout, Arc::new(runner), Arc::new(table))
                .expect("catalogue");
        let report = orchestrator.status_all();

        assert_eq!(report.mode, OperatingMode::Local);
        let observed: Vec<(&str, UnitStatus, Option<u32>)> = report
            .units
            .iter()
            .map(|entry| (entry.unit.as_str(), entry.status, entry.pid))
            .collect();
        assert_eq!(
            observed,
            [
                (DATABASE, UnitStatus::Running, None),
                (CACHE, UnitStatus::Running, None),
                (API, UnitStatus::Running, Some(4242)),
                (WORKER, UnitStatus::Stopped, None),
                (FRONTEND, UnitStatus::Stopped, None),
            ]
        );
    }
}
