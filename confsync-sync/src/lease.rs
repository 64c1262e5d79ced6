//! Scoped repair of a mirror's git lock files.
//!
//! A git process killed mid-operation leaves `index.lock` (or `HEAD.lock`,
//! `config.lock`) behind, and every later git command in that repository
//! fails until it is removed. Acquiring a [`MirrorLease`] removes stale locks
//! before the first git invocation. Locks that appear while the lease is held
//! belong to whichever git process created them and are left alone; git
//! releases its own locks when the command finishes.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

pub const LOCK_FILES: [&str; 3] = ["index.lock", "HEAD.lock", "config.lock"];

#[derive(Debug)]
pub struct MirrorLease {
    git_dir: PathBuf,
}

impl MirrorLease {
    /// Repair `repo_dir` and hold it for the duration of one step.
    pub fn acquire(repo_dir: &Path) -> Self {
        let lease = Self {
            git_dir: repo_dir.join(".git"),
        };
        lease.repair();
        lease
    }

    /// Remove stale lock files. Returns the paths removed.
    pub fn repair(&self) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        for name in LOCK_FILES {
            let lock = self.git_dir.join(name);
            if !lock.exists() {
                continue;
            }
            match std::fs::remove_file(&lock) {
                Ok(()) => {
                    info!("removed stale lock file {}", lock.display());
                    removed.push(lock);
                }
                Err(e) => warn!("failed to remove lock file {}: {e}", lock.display()),
            }
        }
        removed
    }
}
