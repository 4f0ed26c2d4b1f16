//! CLI entrypoint for the `stackctl` service supervisor.
//!
//! The binary delegates to [`stackctl_cli::run`], which loads configuration,
//! parses the lifecycle command and drives the unit orchestrator.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    stackctl_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
