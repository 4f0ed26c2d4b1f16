//! Command-line runtime for the `stackctl` service supervisor.
//!
//! The module owns argument parsing, configuration bootstrapping, telemetry
//! installation and lifecycle dispatch. It can be driven from the binary
//! entrypoint or from tests where configuration loading and IO streams are
//! substituted.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;

mod cli;
mod commands;
mod config;
mod errors;
mod output;
mod telemetry;

use cli::Cli;
pub use cli::OutputFormat;
use config::{ConfigArgumentSplit, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
use output::ConsoleOutput;

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: keep in sync with the fields of `stackctl_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--project-root",
    "--runtime-dir",
    "--log-dir",
    "--env-file",
    "--backing-store-key",
    "--sidecar-program",
    "--sidecar-marker",
    "--container-engine",
    "--cache-container",
    "--cache-image",
    "--cache-ports",
    "--api-command",
    "--api-dir",
    "--worker-command",
    "--worker-dir",
    "--frontend-command",
    "--frontend-dir",
    "--api-grace-seconds",
    "--worker-grace-seconds",
    "--frontend-grace-seconds",
    "--container-settle-seconds",
    "--stop-timeout-seconds",
    "--restart-cooldown-seconds",
    "--log-filter",
    "--log-format",
];

struct CliRunner<'a, W: Write, E: Write, L: ConfigLoader> {
    output: ConsoleOutput<&'a mut W, &'a mut E>,
    loader: &'a L,
}

impl<'a, W, E, L> CliRunner<'a, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    fn new(stdout: &'a mut W, stderr: &'a mut E, loader: &'a L) -> Self {
        Self {
            output: ConsoleOutput::new(stdout, stderr),
            loader,
        }
    }

    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);
        let cli_arguments = prepare_cli_arguments(&args, &split);

        let result = self
            .parse(cli_arguments)
            .and_then(|cli| {
                self.loader
                    .load(&split.config_arguments)
                    .map(|config| (cli, config))
            })
            .and_then(|(cli, config)| {
                telemetry::initialise(&config)?;
                let command = cli.command.ok_or(AppError::BareInvocation)?;
                commands::execute(command, cli.output, &config, &mut self.output)
            });

        match result {
            Ok(exit_code) => exit_code,
            Err(AppError::BareInvocation) => ExitCode::FAILURE,
            Err(AppError::CliUsage(error)) => self.report_usage(&error),
            Err(error) => {
                let _ = self.output.stderr_line(format_args!("{error}"));
                ExitCode::FAILURE
            }
        }
    }

    /// Parses the command tokens, printing usage to stderr when no command
    /// was given.
    fn parse(&mut self, cli_arguments: Vec<OsString>) -> Result<Cli, AppError> {
        let cli = Cli::try_parse_from(cli_arguments).map_err(AppError::CliUsage)?;
        if cli.command.is_none() {
            let mut command = <Cli as clap::CommandFactory>::command();
            let _ = writeln!(self.output.stderr, "{}", command.render_usage());
            let _ = writeln!(
                self.output.stderr,
                "\nRun 'stackctl --help' for the list of commands."
            );
            return Err(AppError::BareInvocation);
        }
        Ok(cli)
    }

    fn report_usage(&mut self, error: &clap::Error) -> ExitCode {
        match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = write!(self.output.stdout, "{error}");
                ExitCode::SUCCESS
            }
            _ => {
                let _ = write!(self.output.stderr, "{error}");
                ExitCode::FAILURE
            }
        }
    }
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner::new(stdout, stderr, loader).run(args)
}

fn prepare_cli_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    let mut cli_arguments: Vec<OsString> = Vec::new();
    if let Some(first) = args.first() {
        cli_arguments.push(first.clone());
    }
    if split.command_start < args.len() {
        cli_arguments.extend(args[split.command_start..].iter().cloned());
    }
    cli_arguments
}
