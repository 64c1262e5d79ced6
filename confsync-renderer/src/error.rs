//! Error types for confsync-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while rendering prompts, commit messages, or PR text.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// Building the tera context from a context struct failed.
    #[error("context serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading an override template from disk failed.
    #[error("template override io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A template that must produce text (commit message, PR title) rendered blank.
    #[error("template '{name}' rendered empty output")]
    Empty { name: &'static str },
}
