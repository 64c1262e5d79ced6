//! Run entrypoint: every target, in registry order, one at a time.
//!
//! Errors local to a target become a [`TargetOutcome::Failed`] and the run
//! moves on. Only a storage root that cannot be created aborts the run.

use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{error, info, warn};

use confsync_core::{Settings, Target, TargetKind};
use confsync_renderer::Renderer;
use confsync_transform::{ContentTransformer, TransformRequest};

use crate::apply::{
    Change, ChangeApplier, Publication, PublishMode, PullRequestStatus, TopicBranchClock,
};
use crate::branch::resolve_default_branch;
use crate::diff::unified_diff;
use crate::error::{io_err, GitError, Stage, SyncError};
use crate::github::PullRequestPublisher;
use crate::mirror::Mirror;

// ---------------------------------------------------------------------------
// Options and report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub instruction: String,
    pub mode: PublishMode,
    /// Fetch and reset mirrors before use. Off for `--push`, which works on
    /// the existing local mirror.
    pub sync_mirrors: bool,
    /// Base branch for every target, bypassing remote HEAD lookup.
    pub force_branch: Option<String>,
    /// Transform and diff only. Nothing is committed or pushed.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    /// Parser target mirrored and its schema source read.
    SchemaRead { bytes: usize },
    Published(Publication),
    UpToDate,
    Skipped { reason: String },
    Failed { error: String },
    DryRun { diff: String },
}

impl TargetOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TargetOutcome::Failed { .. })
    }
}

impl fmt::Display for TargetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetOutcome::SchemaRead { bytes } => write!(f, "schema read ({bytes} bytes)"),
            TargetOutcome::Published(Publication::DirectPush { branch }) => {
                write!(f, "pushed to {branch}")
            }
            TargetOutcome::Published(Publication::TopicBranch {
                branch,
                pull_request,
                ..
            }) => match pull_request {
                PullRequestStatus::Opened { url } => {
                    write!(f, "pushed {branch}, pull request {url}")
                }
                PullRequestStatus::Failed { reason } => {
                    write!(f, "pushed {branch}, pull request not created: {reason}")
                }
            },
            TargetOutcome::Published(Publication::UpToDate) | TargetOutcome::UpToDate => {
                write!(f, "up to date")
            }
            TargetOutcome::Skipped { reason } => write!(f, "skipped: {reason}"),
            TargetOutcome::Failed { error } => write!(f, "failed: {error}"),
            TargetOutcome::DryRun { .. } => write!(f, "would change"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TargetReport {
    pub target: Target,
    pub outcome: TargetOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub targets: Vec<TargetReport>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.targets.iter().filter(|t| t.outcome.is_failure()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failures() > 0
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Default branch per mirror directory, or why the repository is unusable.
type RepoCache = HashMap<PathBuf, Result<String, String>>;

pub struct Pipeline<'a> {
    settings: &'a Settings,
    renderer: &'a Renderer,
    transformer: &'a dyn ContentTransformer,
    publisher: &'a dyn PullRequestPublisher,
    mirror: Mirror,
    clock: TopicBranchClock,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        renderer: &'a Renderer,
        transformer: &'a dyn ContentTransformer,
        publisher: &'a dyn PullRequestPublisher,
    ) -> Self {
        Self {
            settings,
            renderer,
            transformer,
            publisher,
            mirror: Mirror::from_settings(settings),
            clock: TopicBranchClock::new(),
        }
    }

    pub async fn run(&self, targets: &[Target], opts: &RunOptions) -> Result<RunReport, SyncError> {
        let root = &self.settings.storage_root;
        std::fs::create_dir_all(root).map_err(|e| io_err(root, e))?;

        let mut repos = RepoCache::new();
        let mut schema: Option<String> = None;
        let mut schema_path = String::new();
        let mut report = RunReport::default();

        for target in targets {
            info!("processing {} ({})", target.url, target.file_path.display());
            let outcome = match target.kind {
                TargetKind::Parser => match self.load_schema(target, opts, &mut repos).await {
                    Ok(source) => {
                        let bytes = source.len();
                        schema = Some(source);
                        schema_path = target.file_path.to_string_lossy().replace('\\', "/");
                        TargetOutcome::SchemaRead { bytes }
                    }
                    Err(error) => TargetOutcome::Failed { error },
                },
                TargetKind::Config => match &schema {
                    Some(source) => {
                        self.process_config(target, source, &schema_path, opts, &mut repos)
                            .await
                    }
                    None => TargetOutcome::Skipped {
                        reason: "schema source unavailable".to_string(),
                    },
                },
            };

            match &outcome {
                TargetOutcome::Failed { error: e } => {
                    error!("{} ({}): {e}", target.url, target.file_path.display())
                }
                TargetOutcome::Skipped { reason } => {
                    warn!("{} ({}): skipped, {reason}", target.url, target.file_path.display())
                }
                other => info!("{} ({}): {other}", target.url, target.file_path.display()),
            }
            report.targets.push(TargetReport {
                target: target.clone(),
                outcome,
            });
        }

        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Repository preparation (once per repository per run)
    // -----------------------------------------------------------------------

    async fn prepare_repo(
        &self,
        target: &Target,
        opts: &RunOptions,
        repos: &mut RepoCache,
    ) -> Result<String, String> {
        if let Some(cached) = repos.get(&target.local_dir) {
            return cached.clone();
        }
        let result = self
            .prepare_repo_uncached(target, opts)
            .await
            .map_err(|e| e.to_string());
        repos.insert(target.local_dir.clone(), result.clone());
        result
    }

    async fn prepare_repo_uncached(
        &self,
        target: &Target,
        opts: &RunOptions,
    ) -> Result<String, SyncError> {
        // `--branch` names the base for config repositories only; the
        // parser repository always reads from its own default branch.
        let forced = match target.kind {
            TargetKind::Config => opts.force_branch.as_ref(),
            TargetKind::Parser => None,
        };
        let branch = match forced {
            Some(b) => b.clone(),
            None => resolve_default_branch(&target.url, self.settings.token()).await,
        };

        if opts.sync_mirrors {
            self.mirror.ensure(target, &branch).await?;
        } else {
            let dir = self.mirror.dir_for(target);
            if !dir.join(".git").exists() {
                return Err(SyncError::git(
                    &target.url,
                    Stage::Checkout,
                    GitError::MissingWorkTree { path: dir },
                ));
            }
        }
        Ok(branch)
    }

    fn read_target(&self, target: &Target) -> Result<Option<String>, SyncError> {
        let path = self.mirror.dir_for(target).join(&target.file_path);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(path, e)),
        }
    }

    // -----------------------------------------------------------------------
    // Per-kind processing
    // -----------------------------------------------------------------------

    async fn load_schema(
        &self,
        target: &Target,
        opts: &RunOptions,
        repos: &mut RepoCache,
    ) -> Result<String, String> {
        self.prepare_repo(target, opts, repos).await?;
        match self.read_target(target) {
            Ok(Some(source)) => Ok(source),
            Ok(None) => Err(format!(
                "{} not found in {}",
                target.file_path.display(),
                target.slug
            )),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn process_config(
        &self,
        target: &Target,
        schema_source: &str,
        schema_path: &str,
        opts: &RunOptions,
        repos: &mut RepoCache,
    ) -> TargetOutcome {
        let branch = match self.prepare_repo(target, opts, repos).await {
            Ok(branch) => branch,
            Err(error) => return TargetOutcome::Failed { error },
        };

        let original = match self.read_target(target) {
            Ok(Some(content)) => content,
            Ok(None) => {
                return TargetOutcome::Skipped {
                    reason: format!("{} not found", target.file_path.display()),
                }
            }
            Err(e) => return TargetOutcome::Failed { error: e.to_string() },
        };

        let request = TransformRequest {
            original_content: &original,
            instruction: &opts.instruction,
            schema_source,
            schema_path,
            repo_url: &target.url,
        };
        let modified = match self.transformer.transform(&request).await {
            Ok(content) => content,
            Err(source) => {
                let e = SyncError::Generation {
                    url: target.url.clone(),
                    source,
                };
                return TargetOutcome::Failed { error: e.to_string() };
            }
        };

        if opts.dry_run {
            let path = target.file_path.to_string_lossy().replace('\\', "/");
            let diff = unified_diff(&path, &original, &modified);
            return if diff.is_empty() {
                TargetOutcome::UpToDate
            } else {
                TargetOutcome::DryRun { diff }
            };
        }

        let change = Change {
            target,
            original_content: &original,
            modified_content: &modified,
            instruction: &opts.instruction,
        };
        let applier = ChangeApplier::new(
            self.settings,
            &self.mirror,
            self.renderer,
            self.publisher,
            &self.clock,
        );
        match applier.apply(&change, &branch, opts.mode).await {
            Ok(Publication::UpToDate) => TargetOutcome::UpToDate,
            Ok(publication) => TargetOutcome::Published(publication),
            Err(e) => TargetOutcome::Failed { error: e.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confsync_core::RepoSlug;

    fn report_with(outcomes: Vec<TargetOutcome>) -> RunReport {
        let target = Target::new(
            TargetKind::Config,
            RepoSlug::new("a", "b"),
            "https://github.com/a/b",
            "c.yml",
        );
        RunReport {
            targets: outcomes
                .into_iter()
                .map(|outcome| TargetReport {
                    target: target.clone(),
                    outcome,
                })
                .collect(),
        }
    }

    #[test]
    fn failures_count_only_failed_outcomes() {
        let report = report_with(vec![
            TargetOutcome::UpToDate,
            TargetOutcome::Skipped { reason: "x".into() },
            TargetOutcome::Failed { error: "boom".into() },
        ]);
        assert_eq!(report.failures(), 1);
        assert!(report.has_failures());
        assert!(!report_with(vec![TargetOutcome::UpToDate]).has_failures());
    }

    #[test]
    fn outcome_display_mentions_pull_request_failure() {
        let outcome = TargetOutcome::Published(Publication::TopicBranch {
            branch: "sync-configs-1".into(),
            base: "main".into(),
            pull_request: PullRequestStatus::Failed {
                reason: "403".into(),
            },
        });
        let text = outcome.to_string();
        assert!(text.contains("sync-configs-1"));
        assert!(text.contains("not created"));
    }
}
