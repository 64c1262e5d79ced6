//! Template contexts: serializable rendering payloads.

use serde::Serialize;

use confsync_core::Target;

use crate::error::RenderError;

/// Payload for the generation system prompt.
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    pub repo_url: String,
    pub original_content: String,
    /// Source of the canonical configuration type definitions.
    pub schema_source: String,
    pub schema_path: String,
    /// Pretty-printed JSON object of `manifest_url -> manifest`.
    pub manifests_json: String,
}

/// Payload for commit messages.
#[derive(Debug, Clone, Serialize)]
pub struct CommitContext {
    pub file_name: String,
    pub instruction: String,
    pub requested_by: String,
}

impl CommitContext {
    pub fn new(target: &Target, instruction: &str, requested_by: &str) -> Self {
        Self {
            file_name: target.file_name(),
            instruction: instruction.trim().to_string(),
            requested_by: requested_by.to_string(),
        }
    }
}

/// Payload for pull request title and body.
#[derive(Debug, Clone, Serialize)]
pub struct PullRequestContext {
    pub file_name: String,
    pub file_path: String,
    pub instruction: String,
    pub requested_by: String,
    pub base_branch: String,
    pub head_branch: String,
}

impl PullRequestContext {
    pub fn new(
        target: &Target,
        instruction: &str,
        requested_by: &str,
        base_branch: &str,
        head_branch: &str,
    ) -> Self {
        Self {
            file_name: target.file_name(),
            file_path: target.file_path.to_string_lossy().replace('\\', "/"),
            instruction: instruction.trim().to_string(),
            requested_by: requested_by.to_string(),
            base_branch: base_branch.to_string(),
            head_branch: head_branch.to_string(),
        }
    }
}

/// Convert any context struct into a [`tera::Context`].
pub(crate) fn to_tera_context<T: Serialize>(ctx: &T) -> Result<tera::Context, RenderError> {
    tera::Context::from_serialize(ctx).map_err(RenderError::from)
}
