//! Command lines for self-spawned units.
//!
//! Commands are written as a single whitespace-separated string in
//! configuration (`api_command = "uvicorn app.main:app --port 8000"`). Quoting
//! is not interpreted; wrap the command in `sh -c` when shell syntax is needed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Program and argument vector launched for a unit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    /// Builds a command line from a program and its arguments.
    #[must_use]
    pub fn from_parts<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Executable to launch.
    #[must_use]
    pub fn program(&self) -> &str {
        self.program.as_str()
    }

    /// Arguments passed to the executable.
    #[must_use]
    pub fn args(&self) -> &[String] {
        self.args.as_slice()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.program)?;
        for arg in &self.args {
            write!(formatter, " {arg}")?;
        }
        Ok(())
    }
}

impl FromStr for CommandLine {
    type Err = CommandLineParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut parts = input.split_whitespace();
        let program = parts.next().ok_or(CommandLineParseError::Empty)?;
        Ok(Self::from_parts(program, parts))
    }
}

impl TryFrom<String> for CommandLine {
    type Error = CommandLineParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CommandLine> for String {
    fn from(value: CommandLine) -> Self {
        value.to_string()
    }
}

/// Errors raised when parsing a [`CommandLine`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandLineParseError {
    /// The command contained no program.
    #[error("command line must name a program")]
    Empty,
}
