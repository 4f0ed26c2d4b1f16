//! Aggregated status across units.

use std::fmt;

use serde::Serialize;

use crate::mode::OperatingMode;
use crate::unit::{UnitKind, UnitStatus};

/// Status of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    /// Unit name.
    pub unit: String,
    /// Lifecycle mechanism.
    pub kind: UnitKind,
    /// Observed state.
    pub status: UnitStatus,
    /// Live process identifier for PID-tracked units.
    pub pid: Option<u32>,
}

/// Status of every active unit in startup order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Operating mode the report was taken under.
    pub mode: OperatingMode,
    /// One entry per active unit.
    pub units: Vec<StatusEntry>,
}

impl StatusReport {
    /// Looks up the entry for `unit`.
    #[must_use]
    pub fn entry(&self, unit: &str) -> Option<&StatusEntry> {
        self.units.iter().find(|entry| entry.unit == unit)
    }
}

const HEADERS: [&str; 4] = ["UNIT", "KIND", "STATUS", "PID"];

impl fmt::Display for StatusReport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<[String; 4]> = self
            .units
            .iter()
            .map(|entry| {
                [
                    entry.unit.clone(),
                    entry.kind.to_string(),
                    entry.status.to_string(),
                    entry.pid.map_or_else(|| "-".to_owned(), |pid| pid.to_string()),
                ]
            })
            .collect();

        let mut widths = HEADERS.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        writeln!(formatter, "mode: {}", self.mode)?;
        write_row(formatter, &widths, HEADERS.iter().copied())?;
        for row in &rows {
            write_row(formatter, &widths, row.iter().map(String::as_str))?;
        }
        Ok(())
    }
}

fn write_row<'a>(
    formatter: &mut fmt::Formatter<'_>,
    widths: &[usize; 4],
    cells: impl Iterator<Item = &'a str>,
) -> fmt::Result {
    let mut line = String::new();
    for (cell, width) in cells.zip(widths) {
        if !line.is_empty() {
            line.push_str("  ");
        }
        line.push_str(&format!("{cell:<width$}"));
    }
    writeln!(formatter, "{}", line.trim_end())
}
