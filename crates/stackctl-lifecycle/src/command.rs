//! External command execution for container engines and sidecar tools.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

use crate::process::spawn::open_log_sink;

const COMMAND_TARGET: &str = "stackctl::command";

/// Where the output of an invocation is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Capture stdout for parsing; stderr is discarded.
    Capture,
    /// Inherit the supervisor's terminal.
    Attached,
    /// Append stdout and stderr to the given log sink.
    AppendTo(PathBuf),
}

/// A single external command to run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    output: OutputMode,
}

impl Invocation {
    /// Creates an invocation whose output is captured.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            output: OutputMode::Capture,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Runs the command from `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Selects the output mode.
    #[must_use]
    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Executable name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Argument vector.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Working directory override.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Output routing.
    #[must_use]
    pub const fn output_mode(&self) -> &OutputMode {
        &self.output
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.program)?;
        for arg in &self.args {
            write!(formatter, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of a completed invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or `None` when the command was terminated by a signal.
    pub code: Option<i32>,
    /// Captured stdout; empty unless [`OutputMode::Capture`] was used.
    pub stdout: String,
}

impl CommandOutput {
    /// Builds a successful output carrying `stdout`.
    #[must_use]
    pub fn success_with(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
        }
    }

    /// Builds an output that exited with `code`.
    #[must_use]
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
        }
    }

    /// Returns true when the command exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Runs external commands to completion.
pub trait CommandRunner: Send + Sync {
    /// Executes the invocation and waits for it to finish.
    fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput>;
}

/// Errors raised when an external command cannot be relied upon.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be launched.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        /// Program that failed to launch.
        program: String,
        /// Underlying launch error.
        #[source]
        source: io::Error,
    },
    /// The program ran but reported failure.
    #[error("'{command}' exited with {}", describe_status(*.code))]
    Failed {
        /// Rendered command line.
        command: String,
        /// Exit code, if any.
        code: Option<i32>,
    },
}

fn describe_status(code: Option<i32>) -> String {
    code.map_or_else(|| String::from("a signal"), |code| format!("status {code}"))
}

/// Runs `invocation` and converts launch errors and non-zero exits into
/// [`CommandError`].
pub(crate) fn run_checked(
    runner: &dyn CommandRunner,
    invocation: &Invocation,
) -> Result<CommandOutput, CommandError> {
    let output = runner
        .run(invocation)
        .map_err(|source| CommandError::Launch {
            program: invocation.program().to_owned(),
            source,
        })?;
    if output.success() {
        Ok(output)
    } else {
        Err(CommandError::Failed {
            command: invocation.to_string(),
            code: output.code,
        })
    }
}

/// Runs commands through [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        debug!(target: COMMAND_TARGET, command = %invocation, "running command");
        let mut command = Command::new(invocation.program());
        command.args(invocation.arguments());
        if let Some(dir) = invocation.working_dir() {
            command.current_dir(dir);
        }

        match invocation.output_mode() {
            OutputMode::Capture => {
                let output = command
                    .stdin(Stdio::null())
                    .stderr(Stdio::null())
                    .output()?;
                Ok(CommandOutput {
                    code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                })
            }
            OutputMode::Attached => {
                let status = command.status()?;
                Ok(CommandOutput {
                    code: status.code(),
                    stdout: String::new(),
                })
            }
            OutputMode::AppendTo(path) => {
                let log = open_log_sink(path)?;
                let stderr = log.try_clone()?;
                let status = command
                    .stdin(Stdio::null())
                    .stdout(Stdio::from(log))
                    .stderr(Stdio::from(stderr))
                    .status()?;
                Ok(CommandOutput {
                    code: status.code(),
                    stdout: String::new(),
                })
            }
        }
    }
}
