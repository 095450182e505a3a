//! Exclusive per-repo file lock over the shared `swap/<repo_name>/` working
//! tree, acquired by `O_CREAT|O_EXCL` so two workers can never check out
//! different commits into the same tree at once (spec.md §4.7 step 7a).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::error::SchedulerError;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

fn lock_path(harness_root: &Path, repo_name: &str) -> PathBuf {
    harness_root.join("swap").join(format!("{repo_name}.repo.lock"))
}

/// Held for the lifetime of one worker's exclusive section over a repo's
/// working tree; dropping it releases the lock unconditionally.
pub struct RepoLock {
    path: PathBuf,
}

impl RepoLock {
    /// Busy-waits in `POLL_INTERVAL` increments until the lock file can be
    /// created exclusively.
    pub fn acquire(harness_root: &Path, repo_name: &str) -> Result<Self, SchedulerError> {
        let path = lock_path(harness_root, repo_name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SchedulerError::FileOperationError {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = write!(file, "{}", chrono::Utc::now().to_rfc3339());
                    return Ok(Self { path });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    thread::sleep(POLL_INTERVAL);
                }
                Err(source) => {
                    return Err(SchedulerError::FileOperationError {
                        path: path.clone(),
                        source,
                    })
                }
            }
        }
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to release repo lock");
            }
        }
    }
}

/// Remove any `swap/*.repo.lock` files left over from a crashed prior run.
/// Acceptable only because the harness is single-instance per host (spec.md
/// §9 open question): a lock surviving from a still-running second instance
/// would be wrongly cleared, but multi-host operation is out of scope.
pub fn clear_stale_locks(harness_root: &Path) -> Result<usize, SchedulerError> {
    let swap_dir = harness_root.join("swap");
    let entries = match std::fs::read_dir(&swap_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(source) => {
            return Err(SchedulerError::FileOperationError {
                path: swap_dir,
                source,
            })
        }
    };

    let mut cleared = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("lock")
            && path.to_string_lossy().ends_with(".repo.lock")
        {
            if std::fs::remove_file(&path).is_ok() {
                cleared += 1;
            }
        }
    }
    Ok(cleared)
}
