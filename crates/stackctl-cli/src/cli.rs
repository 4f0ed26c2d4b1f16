//! CLI argument definitions for `stackctl`.
//!
//! Configuration flags are handled by the configuration loader; this parser
//! only sees the tokens following them.

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for lifecycle results.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text for operators.
    #[default]
    Human,
    /// Machine-readable JSON; applies to `status`.
    Json,
}

/// Single-host service supervisor.
#[derive(Parser, Debug)]
#[command(name = "stackctl", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Controls how results are rendered.
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub(crate) output: OutputFormat,
    /// Lifecycle action to perform.
    #[command(subcommand)]
    pub(crate) command: Option<StackCommand>,
}

/// Lifecycle actions across every unit.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StackCommand {
    /// Starts every unit in order, stopping at the first failure.
    Start,
    /// Stops every unit in reverse order.
    Stop,
    /// Stops every unit, pauses, then starts them again.
    Restart,
    /// Reports the state of every unit.
    Status,
}

impl StackCommand {
    /// Returns true for actions that change unit state.
    pub(crate) const fn is_mutating(self) -> bool {
        !matches!(self, Self::Status)
    }
}
