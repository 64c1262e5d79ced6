//! # confsync-sync
//!
//! Repository synchronization: local mirrors, default branch lookup, the
//! change applier, pull request publishing, and the per-run pipeline.
//!
//! Call [`Pipeline::run`] with the resolved targets to process a whole run.

pub mod apply;
pub mod branch;
pub mod cleanup;
pub mod diff;
pub mod error;
pub mod git;
pub mod github;
pub mod lease;
pub mod mirror;
pub mod pipeline;
pub mod writer;

pub use apply::{
    Change, ChangeApplier, Publication, PublishMode, PullRequestStatus, TopicBranchClock,
    TOPIC_BRANCH_PREFIX,
};
pub use branch::{resolve_default_branch, FALLBACK_BRANCH};
pub use cleanup::{cleanup_topic_branches, BranchCleanup};
pub use error::{GitError, PublishError, Stage, SyncError};
pub use github::{GitHubClient, GitHubPublisher, PullRequestPublisher};
pub use mirror::{Mirror, MirrorState};
pub use pipeline::{Pipeline, RunOptions, RunReport, TargetOutcome, TargetReport};
