//! Behavioural tests driving real processes through the process driver.

use std::cell::RefCell;
use std::fs;
use std::process::Command;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use stackctl_config::{CommandLine, RuntimeLayout};
use tempfile::TempDir;

use crate::drivers::{ProcessDriver, ProcessSpec, StartFailure, TerminationScope, UnitDriver};
use crate::liveness::LivenessTracker;
use crate::process::{ProcessTable, SystemProcessTable};
use crate::unit::{StartOutcome, StopOutcome, UnitDescriptor, UnitKind, UnitStatus};

const UNIT: &str = "frontend";
const WAIT_TIMEOUT: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

type StepResult = Result<(), String>;

struct ProcessWorld {
    dir: TempDir,
    layout: RuntimeLayout,
    table: Arc<SystemProcessTable>,
    driver: Option<ProcessDriver>,
    starts: Vec<Result<StartOutcome, StartFailure>>,
    status: Option<UnitStatus>,
    children: Vec<u32>,
    root: Option<u32>,
}

impl ProcessWorld {
    fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let layout = RuntimeLayout::new(dir.path().join("run"), dir.path().join("logs"));
        Self {
            dir,
            layout,
            table: Arc::new(SystemProcessTable::new()),
            driver: None,
            starts: Vec::new(),
            status: None,
            children: Vec::new(),
            root: None,
        }
    }

    fn configure(&mut self, script: &str, grace: &str, scope: TerminationScope) -> StepResult {
        let seconds: u64 = grace
            .parse()
            .map_err(|error| format!("invalid grace '{grace}': {error}"))?;
        let descriptor = UnitDescriptor::new(
            UNIT,
            UnitKind::SelfSpawnedProcess,
            50,
            self.layout.log_path(UNIT),
        )
        .with_startup_grace(Duration::from_secs(seconds));
        let spec = ProcessSpec {
            command: CommandLine::from_parts("sh", ["-c", script]),
            working_dir: self.dir.path().to_path_buf(),
            stop_timeout: Duration::from_secs(2),
            scope,
        };
        let table: Arc<dyn ProcessTable> = self.table.clone();
        let tracker = LivenessTracker::new(self.layout.clone(), table);
        self.driver = Some(
            ProcessDriver::new(descriptor, spec, tracker).with_poll_interval(POLL_INTERVAL),
        );
        Ok(())
    }

    fn driver(&self) -> Result<&ProcessDriver, String> {
        self.driver
            .as_ref()
            .ok_or_else(|| "no process unit configured".to_owned())
    }

    fn start(&mut self) -> StepResult {
        let result = self.driver()?.start();
        if let Ok(outcome) = &result {
            self.root = outcome.pid();
        }
        self.starts.push(result);
        Ok(())
    }

    fn record_exists(&self) -> bool {
        self.layout.record_path(UNIT).exists()
    }
}

impl Drop for ProcessWorld {
    fn drop(&mut self) {
        if let Some(driver) = &self.driver {
            let _ = driver.stop();
        }
    }
}

#[fixture]
fn world() -> RefCell<ProcessWorld> {
    RefCell::new(ProcessWorld::new())
}

#[given("a process unit running \"{script}\" with a grace period of \"{grace}\" seconds")]
fn given_process_unit(world: &RefCell<ProcessWorld>, script: String, grace: String) -> StepResult {
    world
        .borrow_mut()
        .configure(&script, &grace, TerminationScope::Process)
}

#[given("a tree-terminated unit running \"{script}\" with a grace period of \"{grace}\" seconds")]
fn given_tree_unit(world: &RefCell<ProcessWorld>, script: String, grace: String) -> StepResult {
    world
        .borrow_mut()
        .configure(&script, &grace, TerminationScope::Tree)
}

#[given("a liveness record naming a process that has exited")]
fn given_stale_record(world: &RefCell<ProcessWorld>) -> StepResult {
    let mut child = Command::new("true")
        .spawn()
        .map_err(|error| format!("failed to spawn true: {error}"))?;
    let pid = child.id();
    child
        .wait()
        .map_err(|error| format!("failed to reap true: {error}"))?;
    let world = world.borrow();
    fs::create_dir_all(world.layout.runtime_dir()).map_err(|error| error.to_string())?;
    fs::write(world.layout.record_path(UNIT), format!("{pid}\n"))
        .map_err(|error| error.to_string())
}

#[when("the unit is started")]
fn when_started(world: &RefCell<ProcessWorld>) -> StepResult {
    world.borrow_mut().start()
}

#[when("the unit is probed")]
fn when_probed(world: &RefCell<ProcessWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    let status = world.driver()?.probe();
    world.status = Some(status);
    Ok(())
}

#[when("its child processes are observed")]
fn when_children_observed(world: &RefCell<ProcessWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    let root = world.root.ok_or_else(|| "unit did not start".to_owned())?;
    let deadline = Instant::now() + WAIT_TIMEOUT;
    loop {
        let children = world.table.descendants(root);
        if children.len() >= 2 {
            world.children = children;
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(format!("expected two children of {root}, saw {children:?}"));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[when("the unit is stopped")]
fn when_stopped(world: &RefCell<ProcessWorld>) -> StepResult {
    let world = world.borrow();
    let outcome = world
        .driver()?
        .stop()
        .map_err(|error| format!("stop failed: {error}"))?;
    assert_eq!(outcome, StopOutcome::Stopped);
    Ok(())
}

#[then("starting fails because the process exited with code \"{code}\"")]
fn then_exited_during_grace(world: &RefCell<ProcessWorld>, code: String) -> StepResult {
    let code: i32 = code
        .parse()
        .map_err(|error| format!("invalid exit code '{code}': {error}"))?;
    let world = world.borrow();
    match world.starts.last() {
        Some(Err(StartFailure::ExitedDuringGrace { status })) => {
            assert_eq!(status.code(), Some(code));
            Ok(())
        }
        other => Err(format!("expected exit during grace, got {other:?}")),
    }
}

#[then("no liveness record remains")]
fn then_no_record(world: &RefCell<ProcessWorld>) {
    assert!(!world.borrow().record_exists(), "liveness record left behind");
}

#[then("the second start reported the original process")]
fn then_second_start_reused(world: &RefCell<ProcessWorld>) -> StepResult {
    let world = world.borrow();
    let [first, second] = world.starts.as_slice() else {
        return Err(format!("expected two starts, saw {}", world.starts.len()));
    };
    let first = first.as_ref().map_err(|error| format!("first start failed: {error}"))?;
    let second = second
        .as_ref()
        .map_err(|error| format!("second start failed: {error}"))?;
    assert!(matches!(first, StartOutcome::Started { pid: Some(_) }));
    assert_eq!(*second, StartOutcome::AlreadyRunning { pid: first.pid() });
    Ok(())
}

#[then("stopping the unit leaves it stopped")]
fn then_stop_leaves_stopped(world: &RefCell<ProcessWorld>) -> StepResult {
    let world = world.borrow();
    let driver = world.driver()?;
    assert_eq!(driver.stop().map_err(|error| error.to_string())?, StopOutcome::Stopped);
    assert_eq!(driver.probe(), UnitStatus::Stopped);
    assert_eq!(
        driver.stop().map_err(|error| error.to_string())?,
        StopOutcome::NotRunning
    );
    Ok(())
}

#[then("the unit is reported as \"{status}\"")]
fn then_reported(world: &RefCell<ProcessWorld>, status: String) {
    let observed = world.borrow().status.map(|status| status.to_string());
    assert_eq!(observed.as_deref(), Some(status.as_str()));
}

#[then("the unit and its child processes are gone")]
fn then_tree_gone(world: &RefCell<ProcessWorld>) -> StepResult {
    let world = world.borrow();
    let root = world.root.ok_or_else(|| "unit did not start".to_owned())?;
    let deadline = Instant::now() + WAIT_TIMEOUT;
    loop {
        let alive: Vec<u32> = world
            .children
            .iter()
            .copied()
            .chain([root])
            .filter(|&pid| world.table.is_alive(pid))
            .collect();
        if alive.is_empty() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(format!("processes still alive after stop: {alive:?}"));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[scenario(path = "tests/features/process_lifecycle.feature")]
fn process_lifecycle(#[from(world)] _: RefCell<ProcessWorld>) {}
