//! Removal of stale `sync-configs-*` topic branches.
//!
//! Only branches carrying the topic prefix are touched, never the default
//! branch or a protected one. Mirrors themselves are never deleted.

use std::path::Path;

use tracing::{info, warn};

use confsync_core::RepoSlug;

use crate::apply::TOPIC_BRANCH_PREFIX;
use crate::error::{GitError, SyncError};
use crate::git::Git;
use crate::github::{GitHubClient, RemoteBranch};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchCleanup {
    /// Remote branches deleted (or, for a dry run, that would be).
    pub remote: Vec<String>,
    /// Local mirror branches deleted (or that would be).
    pub local: Vec<String>,
    /// `branch: reason` for every deletion that failed.
    pub errors: Vec<String>,
}

/// Remote branches eligible for deletion.
pub fn stale_topic_branches<'b>(branches: &'b [RemoteBranch], default_branch: &str) -> Vec<&'b str> {
    branches
        .iter()
        .filter(|b| b.name.starts_with(TOPIC_BRANCH_PREFIX))
        .filter(|b| !b.protected && b.name != default_branch)
        .map(|b| b.name.as_str())
        .collect()
}

/// Delete stale topic branches of `repo` on the remote and in its mirror.
pub async fn cleanup_topic_branches(
    client: &GitHubClient,
    storage_root: &Path,
    repo: &RepoSlug,
    dry_run: bool,
) -> Result<BranchCleanup, SyncError> {
    let url = format!("https://github.com/{repo}");
    let publish_err = |source| SyncError::Publish {
        url: url.clone(),
        source,
    };

    let default_branch = client.default_branch(repo).await.map_err(publish_err)?;
    let branches = client.list_branches(repo).await.map_err(publish_err)?;

    let mut report = BranchCleanup::default();
    for name in stale_topic_branches(&branches, &default_branch) {
        if dry_run {
            info!("[dry-run] would delete {repo}:{name}");
            report.remote.push(name.to_string());
            continue;
        }
        match client.delete_branch(repo, name).await {
            Ok(()) => {
                info!("deleted {repo}:{name}");
                report.remote.push(name.to_string());
            }
            Err(e) => {
                warn!("could not delete {repo}:{name}: {e}");
                report.errors.push(format!("{name}: {e}"));
            }
        }
    }

    let mirror = storage_root.join(repo.local_dir());
    if mirror.join(".git").exists() {
        cleanup_local(&mirror, &url, &default_branch, dry_run, &mut report).await?;
    }
    Ok(report)
}

async fn cleanup_local(
    mirror: &Path,
    url: &str,
    default_branch: &str,
    dry_run: bool,
    report: &mut BranchCleanup,
) -> Result<(), SyncError> {
    let git = Git::at(mirror);
    let pattern = format!("refs/heads/{TOPIC_BRANCH_PREFIX}*");
    let listed = git
        .run(&["for-each-ref", "--format=%(refname:short)", &pattern])
        .await
        .map_err(|e| mirror_err(url, e))?;
    let current = git
        .run(&["rev-parse", "--abbrev-ref", "HEAD"])
        .await
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    // The checked-out branch cannot be deleted; step off it first.
    let needs_switch = listed.lines().any(|l| l.trim() == current);
    if needs_switch && !dry_run {
        git.run(&["checkout", "--quiet", default_branch])
            .await
            .map_err(|e| mirror_err(url, e))?;
    }

    for name in listed.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if dry_run {
            report.local.push(name.to_string());
            continue;
        }
        match git.run(&["branch", "--quiet", "-D", name]).await {
            Ok(_) => report.local.push(name.to_string()),
            Err(e) => {
                warn!("could not delete local branch {name} in {}: {e}", mirror.display());
                report.errors.push(format!("{name}: {e}"));
            }
        }
    }
    Ok(())
}

fn mirror_err(url: &str, source: GitError) -> SyncError {
    SyncError::git(url, crate::error::Stage::Branch, source)
}
