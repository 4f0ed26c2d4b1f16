//! Advisory lock serialising mutating runs across invocations.
//!
//! The lock is an exclusive `flock` on `<runtime_dir>/stackctl.lock`. The
//! kernel drops it when the holder exits, so a lock file left behind by a
//! dead run is simply locked again. The file records the holder PID for
//! diagnostics only.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use thiserror::Error;
use tracing::{debug, info, warn};

const LOCK_TARGET: &str = "stackctl::lock";

/// Errors raised while acquiring the run lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another live invocation holds the lock.
    #[error(
        "another stackctl run is in progress{}",
        .pid.map_or_else(String::new, |pid| format!(" (pid {pid})"))
    )]
    Held {
        /// PID recorded by the holder, when readable.
        pid: Option<u32>,
    },
    /// The lock file could not be created, locked or written.
    #[error("failed to create lock file '{path}': {source}")]
    Create {
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Held run lock; the file is removed when dropped.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    _file: Flock<File>,
}

impl RunLock {
    /// Acquires the lock at `path` without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Held`] when another process owns the lock.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let create_error = |source: io::Error| LockError::Create {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(create_error)?;
        }

        loop {
            let file = open(path).map_err(create_error)?;
            let lock = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(lock) => lock,
                Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                    return Err(LockError::Held { pid: holder(path) });
                }
                Err((_, errno)) => return Err(create_error(io::Error::from(errno))),
            };
            // A releasing holder unlinks the file before unlocking it.
            if !still_linked(path, &lock).map_err(create_error)? {
                debug!(
                    target: LOCK_TARGET,
                    file = %path.display(),
                    "lock file replaced while locking; retrying"
                );
                continue;
            }
            if let Some(previous) = holder(path) {
                debug!(target: LOCK_TARGET, previous, "taking over lock left by a finished run");
            }
            record_holder(&lock).map_err(create_error)?;
            info!(target: LOCK_TARGET, file = %path.display(), "acquired run lock");
            return Ok(Self {
                path: path.to_path_buf(),
                _file: lock,
            });
        }
    }

    /// Path of the held lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => {
                warn!(
                    target: LOCK_TARGET,
                    file = %self.path.display(),
                    error = %error,
                    "failed to remove lock file"
                );
            }
            _ => debug!(target: LOCK_TARGET, file = %self.path.display(), "released run lock"),
        }
    }
}

fn open(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o600)
        .open(path)
}

fn still_linked(path: &Path, file: &File) -> io::Result<bool> {
    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(current.dev() == held.dev() && current.ino() == held.ino()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

fn record_holder(file: &File) -> io::Result<()> {
    let mut writer = file;
    writer.set_len(0)?;
    writer.seek(SeekFrom::Start(0))?;
    writeln!(writer, "{}", std::process::id())?;
    writer.sync_all()
}

fn holder(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse::<u32>().ok().filter(|pid| *pid != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use tempfile::TempDir;

    fn own_pid() -> String {
        std::process::id().to_string()
    }

    #[test]
    fn acquires_and_releases() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("run").join("stackctl.lock");
        let lock = RunLock::acquire(&path).expect("acquire");
        let recorded = fs::read_to_string(lock.path()).expect("read lock");
        assert_eq!(recorded.trim(), own_pid());
        drop(lock);
        assert!(!path.exists());
        RunLock::acquire(&path).expect("reacquire after release");
    }

    #[test]
    fn held_lock_refuses_a_second_run() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("stackctl.lock");
        let _held = RunLock::acquire(&path).expect("acquire");
        let error = RunLock::acquire(&path).expect_err("held");
        assert!(matches!(error, LockError::Held { pid: Some(pid) } if pid == std::process::id()));
        assert!(path.exists());
    }

    #[test]
    fn leftover_file_from_a_finished_run_is_reused() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("stackctl.lock");
        fs::write(&path, "4242424242\n").expect("seed lock");
        let lock = RunLock::acquire(&path).expect("acquire");
        let recorded = fs::read_to_string(lock.path()).expect("read lock");
        assert_eq!(recorded.trim(), own_pid());
    }

    #[test]
    fn unreadable_leftover_is_reused() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("stackctl.lock");
        fs::write(&path, "garbage").expect("seed lock");
        RunLock::acquire(&path).expect("acquire");
    }

    #[test]
    fn racing_runs_over_a_leftover_file_admit_one_holder() {
        const RUNS: usize = 8;
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("stackctl.lock");
        fs::write(&path, "4242\n").expect("seed lock");
        let barrier = Barrier::new(RUNS);

        let holders = thread::scope(|scope| {
            let runs: Vec<_> = (0..RUNS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        let attempt = RunLock::acquire(&path);
                        barrier.wait();
                        attempt.is_ok()
                    })
                })
                .collect();
            runs.into_iter()
                .map(|run| run.join().expect("join run"))
                .filter(|held| *held)
                .count()
        });

        assert_eq!(holders, 1);
    }
}
