//! Executes lifecycle commands against the unit orchestrator.

use std::io::Write;
use std::process::ExitCode;

use stackctl_config::{Config, RuntimeLayout};
use stackctl_lifecycle::{Orchestrator, RunLock, build_orchestrator};
use tracing::debug;

use crate::AppError;
use crate::cli::{OutputFormat, StackCommand};
use crate::output::{ConsoleOutput, render_start, render_status, render_stop};

const CLI_TARGET: &str = "stackctl::cli";

/// Prepares runtime paths, takes the run lock for mutating commands and
/// dispatches to the orchestrator.
pub(crate) fn execute<W: Write, E: Write>(
    command: StackCommand,
    format: OutputFormat,
    config: &Config,
    output: &mut ConsoleOutput<W, E>,
) -> Result<ExitCode, AppError> {
    if !command.is_mutating() {
        let layout = RuntimeLayout::from_config_readonly(config);
        let orchestrator = build_orchestrator(config, &layout)?;
        return dispatch(command, format, &orchestrator, output);
    }

    let layout = RuntimeLayout::from_config(config)?;
    let lock = RunLock::acquire(layout.lock_path())?;
    debug!(target: CLI_TARGET, lock = %lock.path().display(), ?command, "run lock acquired");
    let orchestrator = build_orchestrator(config, &layout)?;
    let exit_code = dispatch(command, format, &orchestrator, output);
    drop(lock);
    exit_code
}

/// Runs `command` and maps its outcome onto an exit code.
///
/// Only a failed start phase yields a non-zero exit; stop and status report
/// problems without failing.
pub(crate) fn dispatch<W: Write, E: Write>(
    command: StackCommand,
    format: OutputFormat,
    orchestrator: &Orchestrator,
    output: &mut ConsoleOutput<W, E>,
) -> Result<ExitCode, AppError> {
    match command {
        StackCommand::Start => {
            let result = orchestrator.start_all();
            render_start(&result, output)?;
            Ok(exit_code_for(result.is_ok()))
        }
        StackCommand::Stop => {
            render_stop(&orchestrator.stop_all(), output)?;
            Ok(ExitCode::SUCCESS)
        }
        StackCommand::Restart => {
            let report = orchestrator.restart_all();
            render_stop(&report.stop, output)?;
            render_start(&report.start, output)?;
            Ok(exit_code_for(report.start.is_ok()))
        }
        StackCommand::Status => {
            render_status(&orchestrator.status_all(), format, output)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

const fn exit_code_for(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
