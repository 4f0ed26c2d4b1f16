//! Operating-system process table access: liveness queries, descendant
//! discovery, signalling, and detached spawning.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid as NixPid;
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

pub(crate) mod files;
pub(crate) mod spawn;

/// Termination strength requested from the process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Ask the process to exit (`SIGTERM`).
    Graceful,
    /// Kill the process outright (`SIGKILL`).
    Forceful,
}

impl Termination {
    const fn signal(self) -> Signal {
        match self {
            Self::Graceful => Signal::SIGTERM,
            Self::Forceful => Signal::SIGKILL,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.signal().as_str())
    }
}

/// Query and signal primitive over the OS process table.
pub trait ProcessTable: Send + Sync {
    /// Returns true when `pid` names a live, non-zombie process.
    fn is_alive(&self, pid: u32) -> bool;

    /// Returns every descendant of `pid`, deepest first.
    fn descendants(&self, pid: u32) -> Vec<u32>;

    /// Sends a termination signal to `pid`.
    fn signal(&self, pid: u32, termination: Termination) -> io::Result<()>;
}

/// Process table backed by `kill(2)` and `sysinfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

impl SystemProcessTable {
    /// Builds the system process table.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ProcessTable for SystemProcessTable {
    fn is_alive(&self, pid: u32) -> bool {
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        if raw <= 0 {
            return false;
        }
        match kill(NixPid::from_raw(raw), None) {
            Ok(()) | Err(Errno::EPERM) => {}
            Err(_) => return false,
        }
        // `kill(pid, 0)` succeeds for zombies, so confirm the process state.
        let target = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
        system
            .process(target)
            .is_some_and(|process| process.status() != ProcessStatus::Zombie)
    }

    fn descendants(&self, pid: u32) -> Vec<u32> {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
        for (child, process) in system.processes() {
            if let Some(parent) = process.parent() {
                children
                    .entry(parent.as_u32())
                    .or_default()
                    .push(child.as_u32());
            }
        }
        collect_descendants(pid, &children)
    }

    fn signal(&self, pid: u32, termination: Termination) -> io::Result<()> {
        let raw = i32::try_from(pid).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("pid {pid} out of range"))
        })?;
        kill(NixPid::from_raw(raw), termination.signal()).map_err(io::Error::from)
    }
}

/// Walks the parent → children map breadth-first and returns the result
/// deepest first so leaves are signalled before their parents.
fn collect_descendants(root: u32, children: &HashMap<u32, Vec<u32>>) -> Vec<u32> {
    let mut ordered = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        for &child in children.get(&current).into_iter().flatten() {
            if child != root && !ordered.contains(&child) {
                ordered.push(child);
                queue.push_back(child);
            }
        }
    }
    ordered.reverse();
    ordered
}
