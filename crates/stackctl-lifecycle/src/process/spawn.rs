use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use stackctl_config::CommandLine;

/// Opens a log sink in append mode, creating it when absent.
pub(crate) fn open_log_sink(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Spawns `command` in its own session with output appended to `log`.
///
/// The child outlives the supervisor: it is detached from the controlling
/// terminal and the caller only keeps the handle to observe the grace window.
pub(crate) fn spawn_detached(
    command: &CommandLine,
    working_dir: &Path,
    log: File,
) -> io::Result<Child> {
    let stderr = log.try_clone()?;
    let mut process = Command::new(command.program());
    process
        .args(command.args())
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(stderr));

    // SAFETY: `setsid` is async-signal-safe and touches no parent state; it is
    // the only work done between fork and exec.
    unsafe {
        process.pre_exec(|| {
            nix::unistd::setsid().map_err(io::Error::from)?;
            Ok(())
        });
    }

    process.spawn()
}
