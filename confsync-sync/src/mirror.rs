//! Repository mirror: one local working copy per `owner/repo`.
//!
//! ```text
//! absent            -> mkdir, clone, fetch, checkout -B <branch>, reset --hard  => Cloned
//!                      (checkout fails after clone: retry plain checkout once)  => Preserved
//! present, repo     -> set origin, fetch, checkout -B <branch>, reset --hard   => Synced
//! present, not repo -> AmbiguousState, nothing touched
//! ```

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use confsync_core::{Settings, Target};

use crate::error::{io_err, GitError, Stage, SyncError};
use crate::git::{authenticated_url, Git};
use crate::lease::MirrorLease;

/// State a mirror was left in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorState {
    /// Freshly cloned and at the tip of the default branch.
    Cloned,
    /// Existing mirror fetched and hard-reset to the remote tip.
    Synced,
    /// Cloned, but the checkout did not complete. The clone is kept.
    Preserved,
}

/// Mirror operations for one run.
#[derive(Debug, Clone)]
pub struct Mirror {
    storage_root: PathBuf,
    token: Option<String>,
    unattended: bool,
}

impl Mirror {
    pub fn new(storage_root: impl Into<PathBuf>, token: Option<&str>, unattended: bool) -> Self {
        Self {
            storage_root: storage_root.into(),
            token: token.map(str::to_owned),
            unattended,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.storage_root, settings.token(), settings.unattended)
    }

    pub fn dir_for(&self, target: &Target) -> PathBuf {
        target.mirror_dir(&self.storage_root)
    }

    fn remote_for(&self, target: &Target) -> String {
        authenticated_url(&target.url, self.token.as_deref())
    }

    fn git_at(&self, dir: &Path) -> Git {
        Git::at(dir).redacting(self.token.as_deref())
    }

    /// Unattended runs cannot fall back to ambient credentials.
    pub fn require_token(&self, target: &Target) -> Result<(), SyncError> {
        if self.unattended && self.token.is_none() {
            return Err(SyncError::Authentication {
                url: target.url.clone(),
                reason: "AUTH_TOKEN must be set when running unattended".to_string(),
            });
        }
        Ok(())
    }

    /// Bring the mirror of `target` to the tip of `branch`.
    pub async fn ensure(&self, target: &Target, branch: &str) -> Result<MirrorState, SyncError> {
        self.require_token(target)?;
        let dir = self.dir_for(target);
        if dir.exists() {
            self.sync_existing(target, &dir, branch).await
        } else {
            self.clone_fresh(target, &dir, branch).await
        }
    }

    async fn clone_fresh(
        &self,
        target: &Target,
        dir: &Path,
        branch: &str,
    ) -> Result<MirrorState, SyncError> {
        info!("cloning {} into {}", target.url, dir.display());
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        let _lease = MirrorLease::acquire(dir);

        let dir_arg = dir.to_string_lossy();
        let remote = self.remote_for(target);
        let clone = Git::new()
            .redacting(self.token.as_deref())
            .run(&["clone", "--quiet", &remote, &dir_arg])
            .await;
        if let Err(e) = clone {
            // Only succeeds if git left the directory empty.
            let _ = std::fs::remove_dir(dir);
            return Err(SyncError::git(&target.url, Stage::Clone, e));
        }

        let git = self.git_at(dir);
        git.run(&["fetch", "--quiet", "origin"])
            .await
            .map_err(|e| SyncError::git(&target.url, Stage::Fetch, e))?;

        if let Err((stage, e)) = checkout_tip(&git, branch).await {
            warn!(
                "{stage} of {branch} after cloning {} failed: {e}; keeping the clone and retrying once",
                target.url
            );
            if let Err(e) = git.run(&["checkout", branch]).await {
                warn!("retry checkout of {branch} in {} failed: {e}", dir.display());
            }
            return Ok(MirrorState::Preserved);
        }

        info!("cloned {} at {branch}", target.url);
        Ok(MirrorState::Cloned)
    }

    async fn sync_existing(
        &self,
        target: &Target,
        dir: &Path,
        branch: &str,
    ) -> Result<MirrorState, SyncError> {
        if !dir.join(".git").exists() {
            return Err(SyncError::AmbiguousState {
                path: dir.to_path_buf(),
            });
        }
        let _lease = MirrorLease::acquire(dir);
        let git = self.git_at(dir);

        // `.git` could be a stray directory; make sure git agrees.
        if git.run(&["rev-parse", "--git-dir"]).await.is_err() {
            return Err(SyncError::AmbiguousState {
                path: dir.to_path_buf(),
            });
        }

        let remote = self.remote_for(target);
        if git.run(&["remote", "set-url", "origin", &remote]).await.is_err() {
            git.run(&["remote", "add", "origin", &remote])
                .await
                .map_err(|e| SyncError::git(&target.url, Stage::Remote, e))?;
        }

        info!("fetching updates for {}", target.url);
        git.run(&["fetch", "--quiet", "--prune", "origin"])
            .await
            .map_err(|e| SyncError::git(&target.url, Stage::Fetch, e))?;
        checkout_tip(&git, branch)
            .await
            .map_err(|(stage, e)| SyncError::git(&target.url, stage, e))?;

        info!("updated {} to origin/{branch}", target.url);
        Ok(MirrorState::Synced)
    }
}

/// Point the local `branch` at `origin/<branch>` and make the tree match it.
async fn checkout_tip(git: &Git, branch: &str) -> Result<(), (Stage, GitError)> {
    let upstream = format!("origin/{branch}");
    git.run(&["checkout", "--quiet", "-f", "-B", branch, &upstream])
        .await
        .map_err(|e| (Stage::Checkout, e))?;
    git.run(&["reset", "--quiet", "--hard", &upstream])
        .await
        .map_err(|e| (Stage::Reset, e))?;
    Ok(())
}
