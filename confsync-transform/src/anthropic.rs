//! Streaming client for the Anthropic Messages API.
//!
//! The response is a server-sent event stream. Events are separated by a
//! blank line; each carries one `data:` JSON payload tagged by `type`. Only
//! `content_block_delta` text and `error` events matter here.

use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use confsync_core::config::AnthropicSettings;

use crate::error::TransformError;

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const MAX_TOKENS: u32 = 4000;

// ---------------------------------------------------------------------------
// Event model
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    Error { error: ApiErrorBody },
    MessageStop,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

// ---------------------------------------------------------------------------
// SSE framing
// ---------------------------------------------------------------------------

/// Incremental SSE framer. Bytes go in as they arrive; complete `data:`
/// payloads come out. Partial events (and partial UTF-8) stay buffered.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend(chunk.iter().filter(|b| **b != b'\r'));
        let mut payloads = Vec::new();
        while let Some(end) = self.buf.windows(2).position(|w| w == b"\n\n") {
            let event: Vec<u8> = self.buf.drain(..end + 2).collect();
            if let Some(data) = data_lines(&String::from_utf8_lossy(&event)) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Whatever is left once the body ends without a trailing blank line.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        data_lines(&String::from_utf8_lossy(&rest))
    }
}

fn data_lines(event: &str) -> Option<String> {
    let data: Vec<&str> = event
        .lines()
        .filter_map(|l| l.strip_prefix("data:"))
        .map(|l| l.strip_prefix(' ').unwrap_or(l))
        .collect();
    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    settings: AnthropicSettings,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client, settings: AnthropicSettings) -> Self {
        Self { http, settings }
    }

    /// Run one streamed completion and return the accumulated text.
    /// `on_text` sees every text delta as it arrives.
    pub async fn stream_message(
        &self,
        system: &str,
        user: &str,
        mut on_text: impl FnMut(&str),
    ) -> Result<String, TransformError> {
        if self.settings.api_key.expose().is_empty() {
            return Err(TransformError::MissingCredential {
                name: "ANTHROPIC_API_KEY",
            });
        }

        let url = format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.settings.model,
            "max_tokens": MAX_TOKENS,
            "temperature": 0,
            "system": system,
            "messages": [{ "role": "user", "content": user }],
            "stream": true,
        });

        debug!(model = %self.settings.model, "starting generation stream");
        let resp = self
            .http
            .post(&url)
            .header("x-api-key", self.settings.api_key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransformError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut decoder = SseDecoder::default();
        let mut text = String::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            for payload in decoder.push(&chunk?) {
                if apply_event(&payload, &mut text, &mut on_text)? {
                    return Ok(text);
                }
            }
        }
        if let Some(payload) = decoder.finish() {
            apply_event(&payload, &mut text, &mut on_text)?;
        }
        Ok(text)
    }
}

/// Fold one event into `text`. Returns `true` on `message_stop`.
fn apply_event(
    payload: &str,
    text: &mut String,
    on_text: &mut impl FnMut(&str),
) -> Result<bool, TransformError> {
    match serde_json::from_str::<StreamEvent>(payload)? {
        StreamEvent::ContentBlockDelta {
            delta: Delta::TextDelta { text: piece },
        } => {
            on_text(&piece);
            text.push_str(&piece);
            Ok(false)
        }
        StreamEvent::Error { error } => Err(TransformError::Stream {
            kind: error.kind,
            message: error.message,
        }),
        StreamEvent::MessageStop => Ok(true),
        StreamEvent::ContentBlockDelta { .. } | StreamEvent::Other => Ok(false),
    }
}
