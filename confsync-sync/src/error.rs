//! Error types for confsync-sync.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use confsync_core::ConfigError;
use confsync_renderer::RenderError;
use confsync_transform::TransformError;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Pipeline step a git failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Clone,
    Fetch,
    Checkout,
    Reset,
    Remote,
    Pull,
    Add,
    Commit,
    Branch,
    Push,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Clone => "clone",
            Stage::Fetch => "fetch",
            Stage::Checkout => "checkout",
            Stage::Reset => "reset",
            Stage::Remote => "remote setup",
            Stage::Pull => "pull",
            Stage::Add => "stage",
            Stage::Commit => "commit",
            Stage::Branch => "topic branch",
            Stage::Push => "push",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// GitError
// ---------------------------------------------------------------------------

/// One failed git invocation. Arguments and stderr are already redacted.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("could not run git {args}: {source}")]
    Spawn {
        args: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {args} exited with {code}: {stderr}")]
    Failed {
        args: String,
        code: i32,
        stderr: String,
    },

    #[error("no local mirror at {}; run once without --push to create it", path.display())]
    MissingWorkTree { path: PathBuf },
}

// ---------------------------------------------------------------------------
// PublishError
// ---------------------------------------------------------------------------

pub const FORBIDDEN_REMEDIATION: &str = "the token or GitHub App installation lacks \
`pull_requests: write` on this repository; reinstall the app with pull request write \
access for this repository, or use a token that has it";

/// Hosting API failures.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("GitHub API request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// 403: an authorization or installation-scope mismatch, not a transient error.
    #[error("GitHub denied access to {repo} (403: {message}); {}", FORBIDDEN_REMEDIATION)]
    Forbidden { repo: String, message: String },

    #[error("GitHub API returned {status} for {repo}: {message}")]
    Status {
        repo: String,
        status: u16,
        message: String,
    },

    #[error("AUTH_TOKEN is required for GitHub API access")]
    MissingToken,

    #[error("pull request text: {0}")]
    Render(#[from] RenderError),
}

// ---------------------------------------------------------------------------
// SyncError
// ---------------------------------------------------------------------------

/// Everything that can abort one target, plus the few process-fatal cases.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("authentication required for {url}: {reason}")]
    Authentication { url: String, reason: String },

    #[error("{stage} failed for {url}: {source}")]
    Mirror {
        url: String,
        stage: Stage,
        #[source]
        source: GitError,
    },

    #[error("generation failed for {url}: {source}")]
    Generation {
        url: String,
        #[source]
        source: TransformError,
    },

    #[error("publishing to {url} failed: {source}")]
    Publish {
        url: String,
        #[source]
        source: PublishError,
    },

    /// Not repaired automatically: the directory may belong to the user.
    #[error("{} exists but is not a git repository; move or delete it to re-clone", path.display())]
    AmbiguousState { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),
}

impl SyncError {
    pub(crate) fn git(url: &str, stage: Stage, source: GitError) -> Self {
        SyncError::Mirror {
            url: url.to_string(),
            stage,
            source,
        }
    }

    /// Stage of a git failure, if this is one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SyncError::Mirror { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
