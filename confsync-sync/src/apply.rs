//! Change applier: stage, commit and publish one modified file.
//!
//! ## Steps
//!
//! 1. Remote: re-point `origin` at the authenticated URL.
//! 2. Base: check out and fast-forward the base branch.
//! 3. Write and stage exactly the target file.
//! 4. Commit, or stop with [`Publication::UpToDate`] if nothing changed.
//!    Topic branches are created before the commit, so the local base
//!    only ever moves in direct mode.
//! 5. Publish: direct push (interactive) or a fresh `sync-configs-<millis>`
//!    topic branch (otherwise).
//! 6. Pull request for topic branches. Failure here is a warning only.
//!
//! Any failure in steps 1-5 aborts the target with its [`Stage`]. A failure
//! after the write checks the base out again at the tip it had before, so
//! the next target in the same mirror starts clean.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use tracing::{debug, info, warn};

use confsync_core::{Settings, Target};
use confsync_renderer::{CommitContext, Renderer};

use crate::error::{Stage, SyncError};
use crate::git::{authenticated_url, is_missing_remote, Git};
use crate::github::PullRequestPublisher;
use crate::lease::MirrorLease;
use crate::mirror::Mirror;
use crate::writer::{write_atomic, WriteResult};

pub const TOPIC_BRANCH_PREFIX: &str = "sync-configs-";

// ---------------------------------------------------------------------------
// Topic branch naming
// ---------------------------------------------------------------------------

/// Monotonic millisecond clock for topic branch names. Two calls never
/// return the same value, even within one millisecond.
#[derive(Debug, Default)]
pub struct TopicBranchClock {
    last: AtomicI64,
}

impl TopicBranchClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_millis(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|v| v);
        now.max(prev + 1)
    }

    pub fn branch_name(&self) -> String {
        format!("{TOPIC_BRANCH_PREFIX}{}", self.next_millis())
    }
}

// ---------------------------------------------------------------------------
// Inputs and outcomes
// ---------------------------------------------------------------------------

/// One pending content mutation. Consumed once by [`ChangeApplier::apply`].
#[derive(Debug, Clone, Copy)]
pub struct Change<'a> {
    pub target: &'a Target,
    pub original_content: &'a str,
    pub modified_content: &'a str,
    pub instruction: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// Push straight to the base branch. No topic branch, no pull request.
    Direct,
    /// Push a topic branch and open a pull request against the base.
    PullRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullRequestStatus {
    Opened { url: String },
    /// The branch is pushed; the pull request must be opened by hand.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Publication {
    /// Content matched the base tip; nothing committed or pushed.
    UpToDate,
    DirectPush { branch: String },
    TopicBranch {
        branch: String,
        base: String,
        pull_request: PullRequestStatus,
    },
}

// ---------------------------------------------------------------------------
// ChangeApplier
// ---------------------------------------------------------------------------

pub struct ChangeApplier<'a> {
    settings: &'a Settings,
    mirror: &'a Mirror,
    renderer: &'a Renderer,
    publisher: &'a dyn PullRequestPublisher,
    clock: &'a TopicBranchClock,
}

impl<'a> ChangeApplier<'a> {
    pub fn new(
        settings: &'a Settings,
        mirror: &'a Mirror,
        renderer: &'a Renderer,
        publisher: &'a dyn PullRequestPublisher,
        clock: &'a TopicBranchClock,
    ) -> Self {
        Self {
            settings,
            mirror,
            renderer,
            publisher,
            clock,
        }
    }

    /// Apply `change` on top of `base` and publish it according to `mode`.
    pub async fn apply(
        &self,
        change: &Change<'_>,
        base: &str,
        mode: PublishMode,
    ) -> Result<Publication, SyncError> {
        let target = change.target;
        let url = target.url.as_str();
        self.mirror.require_token(target)?;

        let dir = self.mirror.dir_for(target);
        let _lease = MirrorLease::acquire(&dir);
        let token = self.settings.token();
        let git = Git::at(&dir)
            .redacting(token)
            .with_identity(&self.settings.identity);

        // 1. Remote
        match git.run(&["remote", "remove", "origin"]).await {
            Ok(_) => {}
            Err(e) if is_missing_remote(&e) => debug!("no origin remote in {}", dir.display()),
            Err(e) => return Err(SyncError::git(url, Stage::Remote, e)),
        }
        git.run(&["remote", "add", "origin", &authenticated_url(url, token)])
            .await
            .map_err(|e| SyncError::git(url, Stage::Remote, e))?;

        // 2. Base
        git.run(&["checkout", "--quiet", base])
            .await
            .map_err(|e| SyncError::git(url, Stage::Checkout, e))?;
        git.run(&["pull", "--quiet", "--ff-only", "origin", base])
            .await
            .map_err(|e| SyncError::git(url, Stage::Pull, e))?;

        if change.modified_content == change.original_content {
            info!("{} in {url} is already up to date", target.file_name());
            return Ok(Publication::UpToDate);
        }
        let tip = git
            .run(&["rev-parse", "HEAD"])
            .await
            .map_err(|e| SyncError::git(url, Stage::Checkout, e))?;

        let result = self.commit_and_publish(&git, change, base, mode).await;
        if result.is_err() {
            restore_base(&git, base, tip.trim()).await;
        }
        result
    }

    /// Steps 3-6, run with the base checked out at its upstream tip.
    async fn commit_and_publish(
        &self,
        git: &Git,
        change: &Change<'_>,
        base: &str,
        mode: PublishMode,
    ) -> Result<Publication, SyncError> {
        let target = change.target;
        let url = target.url.as_str();
        let file = target.file_path.to_string_lossy();

        // 3. Write and stage
        let path = self.mirror.dir_for(target).join(&target.file_path);
        if let WriteResult::Unchanged { path } = write_atomic(&path, change.modified_content)? {
            debug!("{} already holds the new content", path.display());
        }
        git.run(&["add", "--", &file])
            .await
            .map_err(|e| SyncError::git(url, Stage::Add, e))?;

        // 4. Commit
        let nothing_staged = git
            .check(&["diff", "--cached", "--quiet", "--", &file])
            .await
            .map_err(|e| SyncError::git(url, Stage::Commit, e))?;
        if nothing_staged {
            info!("{} in {url} is already up to date", target.file_name());
            return Ok(Publication::UpToDate);
        }
        let ctx = CommitContext::new(target, change.instruction, &self.settings.requested_by);
        let message = self
            .renderer
            .commit_message(&ctx, self.settings.unattended)?;

        let topic = match mode {
            PublishMode::Direct => None,
            PublishMode::PullRequest => {
                // The staged file carries over to the new branch.
                let branch = self.clock.branch_name();
                git.run(&["checkout", "--quiet", "-b", &branch])
                    .await
                    .map_err(|e| SyncError::git(url, Stage::Branch, e))?;
                Some(branch)
            }
        };
        git.run(&["commit", "--quiet", "-m", &message, "--", &file])
            .await
            .map_err(|e| SyncError::git(url, Stage::Commit, e))?;

        // 5. Publish
        match topic {
            None => {
                git.run(&["push", "--quiet", "origin", base])
                    .await
                    .map_err(|e| SyncError::git(url, Stage::Push, e))?;
                info!("pushed {} to {url} on {base}", target.file_name());
                Ok(Publication::DirectPush {
                    branch: base.to_string(),
                })
            }
            Some(branch) => {
                git.run(&["push", "--quiet", "-u", "origin", &branch])
                    .await
                    .map_err(|e| SyncError::git(url, Stage::Push, e))?;
                info!("pushed branch {branch} to {url}");

                // 6. Pull request
                let pull_request = self.open_pull_request(change, &branch, base).await;
                Ok(Publication::TopicBranch {
                    branch,
                    base: base.to_string(),
                    pull_request,
                })
            }
        }
    }

    async fn open_pull_request(
        &self,
        change: &Change<'_>,
        branch: &str,
        base: &str,
    ) -> PullRequestStatus {
        let target = change.target;
        match self
            .publisher
            .open_pull_request(target, branch, base, change.instruction)
            .await
        {
            Ok(url) => {
                info!("pull request created: {url}");
                PullRequestStatus::Opened { url }
            }
            Err(e) => {
                warn!(
                    "failed to create pull request for {}: {e}. Branch '{branch}' has been pushed; \
                     the pull request can be opened manually",
                    target.url
                );
                PullRequestStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Check `base` out again at `tip`, dropping whatever the failed attempt
/// wrote or committed. An unpublished topic branch is left for `cleanup`.
async fn restore_base(git: &Git, base: &str, tip: &str) {
    let steps: [&[&str]; 2] = [
        &["checkout", "--quiet", "--force", base],
        &["reset", "--quiet", "--hard", tip],
    ];
    for args in steps {
        if let Err(e) = git.run(args).await {
            warn!("could not restore {base} after a failed change: {e}");
            return;
        }
    }
}
