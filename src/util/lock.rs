//! Exclusive ownership of a build output directory.
//!
//! A build holds a [`TargetLock`] on its output directory from before cleaning
//! until the result is reported. The lock is a marker file created with
//! `create_new` that records the owner pid, so a second build (in this process
//! or another one) fails immediately instead of racing on cleanup. A lock left
//! by a process that no longer exists is taken over.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

/// Name of the marker file placed inside the output directory.
pub const LOCK_FILE_NAME: &str = ".stowage-build.lock";

/// Another build already owns the output directory.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("output directory `{}` is in use by another build", .dir.display())]
#[diagnostic(
    code(stowage::build::target_busy),
    help("Wait for the other build to finish, or delete the lock file if it was left behind by a crashed build")
)]
pub struct TargetBusyError {
    pub dir: PathBuf,
    pub lock_path: PathBuf,
    /// Contents of the lock file (owner pid), if readable.
    pub holder: Option<String>,
}

/// Errors from acquiring a target lock.
#[derive(Debug, Error)]
pub enum LockError {
    #[error(transparent)]
    Busy(#[from] TargetBusyError),

    #[error("failed to create lock file `{}`: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// Guard for an exclusively owned output directory. Released on drop.
#[derive(Debug)]
pub struct TargetLock {
    path: PathBuf,
}

impl TargetLock {
    /// Acquire the lock for `dir`, creating the directory if needed.
    pub fn acquire(dir: &Path) -> Result<TargetLock, LockError> {
        let path = dir.join(LOCK_FILE_NAME);

        fs::create_dir_all(dir).map_err(|source| LockError::Io {
            path: path.clone(),
            source,
        })?;

        let mut file = match create_lock_file(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path)
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty());

                match holder.as_deref().and_then(owner_pid) {
                    Some(pid) if !process_alive(pid) => {
                        tracing::warn!(
                            "removing stale lock {} left by exited process {}",
                            path.display(),
                            pid
                        );
                        fs::remove_file(&path).map_err(|source| LockError::Io {
                            path: path.clone(),
                            source,
                        })?;
                        create_lock_file(&path).map_err(|e| match e.kind() {
                            io::ErrorKind::AlreadyExists => LockError::Busy(TargetBusyError {
                                dir: dir.to_path_buf(),
                                lock_path: path.clone(),
                                holder: None,
                            }),
                            _ => LockError::Io {
                                path: path.clone(),
                                source: e,
                            },
                        })?
                    }
                    _ => {
                        return Err(TargetBusyError {
                            dir: dir.to_path_buf(),
                            lock_path: path,
                            holder,
                        }
                        .into());
                    }
                }
            }
            Err(source) => return Err(LockError::Io { path, source }),
        };

        // Lets a later build detect that this one is gone
        let _ = writeln!(file, "pid {}", std::process::id());
        tracing::debug!("acquired {}", path.display());

        Ok(TargetLock { path })
    }
}

fn create_lock_file(path: &Path) -> io::Result<fs::File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// Pid recorded in a lock file (`pid <n>`).
fn owner_pid(contents: &str) -> Option<u32> {
    contents.strip_prefix("pid ")?.trim().parse().ok()
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return true;
    };
    // Signal 0 only checks that the process exists
    !matches!(kill(Pid::from_raw(raw), None), Err(Errno::ESRCH))
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("failed to release {}: {}", self.path.display(), e);
        }
    }
}
