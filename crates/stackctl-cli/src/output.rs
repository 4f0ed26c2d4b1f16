//! Rendering of lifecycle reports for operators and scripts.

use std::fmt;
use std::io::{self, Write};

use stackctl_lifecycle::{
    StartAllError, StartEntry, StartOutcome, StartReport, StatusReport, StopOutcome, StopReport,
};

use crate::AppError;
use crate::cli::OutputFormat;

/// Output handle abstracting over stdout/stderr writers.
pub(crate) struct ConsoleOutput<W: Write, E: Write> {
    pub(crate) stdout: W,
    pub(crate) stderr: E,
}

impl<W: Write, E: Write> ConsoleOutput<W, E> {
    pub(crate) fn new(stdout: W, stderr: E) -> Self {
        Self { stdout, stderr }
    }

    pub(crate) fn stdout_line(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        self.stdout.write_fmt(args)?;
        self.stdout.write_all(b"\n")?;
        self.stdout.flush()
    }

    pub(crate) fn stderr_line(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        self.stderr.write_fmt(args)?;
        self.stderr.write_all(b"\n")?;
        self.stderr.flush()
    }
}

fn start_line(entry: &StartEntry) -> String {
    let unit = entry.unit.as_str();
    match entry.outcome {
        StartOutcome::Started { pid: Some(pid) } => format!("started {unit} (pid {pid})"),
        StartOutcome::Started { pid: None } => format!("started {unit}"),
        StartOutcome::AlreadyRunning { pid: Some(pid) } => {
            format!("{unit} already running (pid {pid})")
        }
        StartOutcome::AlreadyRunning { pid: None } => format!("{unit} already running"),
    }
}

pub(crate) fn render_start<W: Write, E: Write>(
    result: &Result<StartReport, StartAllError>,
    output: &mut ConsoleOutput<W, E>,
) -> Result<(), AppError> {
    match result {
        Ok(report) => {
            for unit in &report.skipped {
                output.stdout_line(format_args!(
                    "skipped {unit} ({} backing store)",
                    report.mode
                ))?;
            }
            for entry in &report.started {
                output.stdout_line(format_args!("{}", start_line(entry)))?;
            }
        }
        Err(error) => {
            for entry in &error.started {
                output.stdout_line(format_args!("{}", start_line(entry)))?;
            }
            output.stderr_line(format_args!("{error}"))?;
        }
    }
    Ok(())
}

pub(crate) fn render_stop<W: Write, E: Write>(
    report: &StopReport,
    output: &mut ConsoleOutput<W, E>,
) -> Result<(), AppError> {
    for entry in &report.entries {
        let unit = entry.unit.as_str();
        match &entry.result {
            Ok(StopOutcome::Stopped) => output.stdout_line(format_args!("stopped {unit}"))?,
            Ok(StopOutcome::NotRunning) => {
                output.stdout_line(format_args!("{unit} not running"))?;
            }
            Err(error) => {
                output.stderr_line(format_args!("warning: failed to stop {unit}: {error}"))?;
            }
        }
    }
    Ok(())
}

pub(crate) fn render_status<W: Write, E: Write>(
    report: &StatusReport,
    format: OutputFormat,
    output: &mut ConsoleOutput<W, E>,
) -> Result<(), AppError> {
    match format {
        OutputFormat::Human => {
            write!(output.stdout, "{report}")?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut output.stdout, report)
                .map_err(AppError::SerialiseStatus)?;
            output.stdout.write_all(b"\n")?;
        }
    }
    output.stdout.flush()?;
    Ok(())
}
