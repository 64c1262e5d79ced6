//! Error types for confsync-transform.

use thiserror::Error;

/// Generation failed for one target. Fatal for that target only.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{name} is required for content generation")]
    MissingCredential { name: &'static str },

    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the messages endpoint.
    #[error("generation API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// An `error` event arrived mid-stream.
    #[error("generation stream error ({kind}): {message}")]
    Stream { kind: String, message: String },

    #[error("invalid generation payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("generation produced no content")]
    Empty,

    #[error("prompt rendering failed: {0}")]
    Render(#[from] confsync_renderer::RenderError),
}
