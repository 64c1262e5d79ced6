//! [`ContentTransformer`] trait and its implementations.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use confsync_core::Settings;
use confsync_renderer::{PromptContext, Renderer};

use crate::anthropic::AnthropicClient;
use crate::error::TransformError;
use crate::manifest::{fetch_manifests, parse_plugin_urls};

/// Everything one generation call needs.
#[derive(Debug, Clone, Copy)]
pub struct TransformRequest<'a> {
    pub original_content: &'a str,
    pub instruction: &'a str,
    pub schema_source: &'a str,
    pub schema_path: &'a str,
    pub repo_url: &'a str,
}

/// `(content, instruction, context) -> content`.
#[async_trait]
pub trait ContentTransformer: Send + Sync {
    async fn transform(&self, req: &TransformRequest<'_>) -> Result<String, TransformError>;
}

/// Trim the generated text, then give it back the original's trailing
/// newline so an unchanged answer compares byte-identical.
pub fn finalize_output(original: &str, generated: &str) -> Result<String, TransformError> {
    let trimmed = generated.trim();
    if trimmed.is_empty() {
        return Err(TransformError::Empty);
    }
    let mut out = trimmed.to_string();
    if original.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Model-backed transformer
// ---------------------------------------------------------------------------

pub struct LlmTransformer {
    http: reqwest::Client,
    client: AnthropicClient,
    renderer: Arc<Renderer>,
    echo: bool,
}

impl LlmTransformer {
    pub fn new(http: reqwest::Client, settings: &Settings, renderer: Arc<Renderer>) -> Self {
        Self {
            client: AnthropicClient::new(http.clone(), settings.anthropic.clone()),
            http,
            renderer,
            echo: false,
        }
    }

    /// Copy streamed text to stdout as it arrives.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

#[async_trait]
impl ContentTransformer for LlmTransformer {
    async fn transform(&self, req: &TransformRequest<'_>) -> Result<String, TransformError> {
        let urls = parse_plugin_urls(req.original_content);
        let manifests = fetch_manifests(&self.http, &urls).await;
        info!(
            "grounding generation on {} of {} plugin manifests",
            manifests.len(),
            urls.len()
        );

        let prompt = self.renderer.system_prompt(&PromptContext {
            repo_url: req.repo_url.to_string(),
            original_content: req.original_content.to_string(),
            schema_source: req.schema_source.to_string(),
            schema_path: req.schema_path.to_string(),
            manifests_json: serde_json::to_string_pretty(&manifests)?,
        })?;

        let echo = self.echo;
        let generated = self
            .client
            .stream_message(&prompt, req.instruction, |piece| {
                if echo {
                    let mut out = std::io::stdout().lock();
                    let _ = out.write_all(piece.as_bytes());
                    let _ = out.flush();
                }
            })
            .await?;
        if echo {
            println!();
        }

        finalize_output(req.original_content, &generated)
    }
}

// ---------------------------------------------------------------------------
// Fixture transformer
// ---------------------------------------------------------------------------

/// Returns a fixed document without any network access.
#[cfg(feature = "mock-generation")]
pub struct FixtureTransformer;

#[cfg(feature = "mock-generation")]
pub const FIXTURE_CONTENT: &str = include_str!("fixtures/ubiquity.yml");

#[cfg(feature = "mock-generation")]
#[async_trait]
impl ContentTransformer for FixtureTransformer {
    async fn transform(&self, req: &TransformRequest<'_>) -> Result<String, TransformError> {
        finalize_output(req.original_content, FIXTURE_CONTENT)
    }
}

/// Pick the transformer for this run.
///
/// `USE_MOCK_CLAUDE_RESPONSE` selects the fixture only in builds with the
/// `mock-generation` feature; elsewhere it is ignored with a warning.
pub fn build_transformer(
    http: reqwest::Client,
    settings: &Settings,
    renderer: Arc<Renderer>,
    echo: bool,
) -> Box<dyn ContentTransformer> {
    if settings.mock_generation {
        #[cfg(feature = "mock-generation")]
        {
            warn!("USE_MOCK_CLAUDE_RESPONSE is set; serving fixture content");
            return Box::new(FixtureTransformer);
        }
        #[cfg(not(feature = "mock-generation"))]
        warn!("USE_MOCK_CLAUDE_RESPONSE is ignored in this build");
    }
    Box::new(LlmTransformer::new(http, settings, renderer).with_echo(echo))
}
