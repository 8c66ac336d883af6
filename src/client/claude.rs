//! Anthropic Messages API client
//!
//! Implements TutorClient over HTTPS, both one-shot and as a server-sent
//! event stream. Rate limits, server errors and connection failures are
//! retried with exponential backoff before a response is accepted; nothing
//! is retried once streaming has started.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::RwLock;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::traits::{ChunkCallback, TutorClient};
use crate::config::AnthropicSettings;
use crate::error::{Error, Result, UpstreamKind};

const SERVICE: &str = "anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Longest wait between retries
const MAX_BACKOFF: Duration = Duration::from_secs(30);

// ─────────────────────────────────────────────────────────────────
// Messages API types (request/response)
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [ApiMessage<'a>; 1],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    message: String,
}

/// Server-sent events of a streaming reply.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta {
        delta: Delta,
    },
    MessageDelta {
        delta: MessageDeltaBody,
    },
    MessageStop,
    Error {
        error: ApiError,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

// ─────────────────────────────────────────────────────────────────
// Claude Client
// ─────────────────────────────────────────────────────────────────

pub struct ClaudeClient {
    settings: AnthropicSettings,
    client: Client,
    total_requests: RwLock<u64>,
}

impl ClaudeClient {
    /// Create a client. Fails with an auth error when no API key is set.
    pub fn new(settings: AnthropicSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(Error::upstream(
                SERVICE,
                UpstreamKind::Auth,
                None,
                "no API key configured",
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %settings.base_url,
            model = %settings.model,
            "Claude client created"
        );

        Ok(Self {
            settings,
            client,
            total_requests: RwLock::new(0),
        })
    }

    /// Successful requests so far
    pub fn total_requests(&self) -> u64 {
        *self.total_requests.read()
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'))
    }

    fn request<'a>(
        &'a self,
        system: &'a str,
        user_turn: &'a str,
        stream: bool,
    ) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            system,
            messages: [ApiMessage {
                role: "user",
                content: user_turn,
            }],
            stream,
        }
    }

    /// POST with retry; returns the first successful response.
    async fn send(&self, body: &MessagesRequest<'_>) -> Result<Response> {
        let url = self.endpoint();
        let mut last_error: Option<Error> = None;

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                let backoff = backoff_delay(attempt);
                debug!(attempt, ?backoff, "Retrying after error");
                tokio::time::sleep(backoff).await;
            }

            let req = self
                .client
                .post(&url)
                .header("x-api-key", &self.settings.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(body);

            match req.send().await {
                Ok(response) if response.status().is_success() => {
                    *self.total_requests.write() += 1;
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    let err = status_error(status, &text);
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        warn!(status = %status, attempt, "Retryable API error");
                        last_error = Some(err);
                    } else {
                        return Err(err);
                    }
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!(attempt, error = %e, "Retryable connection error");
                    last_error = Some(Error::upstream(
                        SERVICE,
                        UpstreamKind::Network,
                        None,
                        e.to_string(),
                    ));
                }
                Err(e) => {
                    return Err(Error::upstream(
                        SERVICE,
                        UpstreamKind::Network,
                        None,
                        e.to_string(),
                    ));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::upstream(
                SERVICE,
                UpstreamKind::Network,
                None,
                "all retry attempts exhausted",
            )
        }))
    }
}

/// 500ms doubled per attempt, capped at [`MAX_BACKOFF`].
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(500u64.saturating_mul(factor)).min(MAX_BACKOFF)
}

/// Map a non-success HTTP status to an upstream error.
fn status_error(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|env| env.error.message)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.chars().take(200).collect()
            }
        });

    let kind = match status.as_u16() {
        401 | 403 => UpstreamKind::Auth,
        429 => UpstreamKind::RateLimited,
        s if s >= 500 => UpstreamKind::Server,
        _ => UpstreamKind::InvalidResponse,
    };

    Error::upstream(SERVICE, kind, Some(status.as_u16()), message)
}

/// Map an `error` event inside a stream.
fn stream_error(error: ApiError) -> Error {
    let kind = match error.error_type.as_deref() {
        Some("overloaded_error") | Some("api_error") => UpstreamKind::Server,
        Some("rate_limit_error") => UpstreamKind::RateLimited,
        Some("authentication_error") | Some("permission_error") => UpstreamKind::Auth,
        _ => UpstreamKind::InvalidResponse,
    };
    Error::upstream(SERVICE, kind, None, error.message)
}

fn invalid(message: impl Into<String>) -> Error {
    Error::upstream(SERVICE, UpstreamKind::InvalidResponse, None, message)
}

/// Apply one SSE line to the reply; returns `Ok(true)` at end of message.
fn apply_sse_line(
    line: &str,
    reply: &mut String,
    on_chunk: &mut ChunkCallback<'_>,
) -> Result<bool> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(false);
    };
    let event: StreamEvent = serde_json::from_str(data.trim())
        .map_err(|e| invalid(format!("malformed stream event: {}", e)))?;

    match event {
        StreamEvent::ContentBlockDelta {
            delta: Delta::TextDelta { text },
        } => {
            reply.push_str(&text);
            if !on_chunk(&text) {
                return Err(Error::TurnAbandoned);
            }
            Ok(false)
        }
        StreamEvent::MessageDelta { delta } => {
            if let Some(reason) = delta.stop_reason {
                debug!(stop_reason = %reason, "Stream stop reason");
            }
            Ok(false)
        }
        StreamEvent::MessageStop => Ok(true),
        StreamEvent::Error { error } => Err(stream_error(error)),
        StreamEvent::ContentBlockDelta { .. } | StreamEvent::Unknown => Ok(false),
    }
}

#[async_trait]
impl TutorClient for ClaudeClient {
    fn name(&self) -> &'static str {
        "claude"
    }

    async fn complete(&self, system_prompt: &str, user_turn: &str) -> Result<String> {
        let body = self.request(system_prompt, user_turn, false);
        let response = self.send(&body).await?;

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| invalid(format!("failed to decode reply: {}", e)))?;

        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();

        if text.is_empty() {
            return Err(invalid("reply contained no text"));
        }

        debug!(
            chars = text.len(),
            stop_reason = parsed.stop_reason.as_deref().unwrap_or("unknown"),
            "Reply received"
        );
        Ok(text)
    }

    async fn complete_streaming<'a>(
        &'a self,
        system_prompt: &'a str,
        user_turn: &'a str,
        mut on_chunk: ChunkCallback<'a>,
    ) -> Result<String> {
        let body = self.request(system_prompt, user_turn, true);
        let response = self.send(&body).await?;

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut reply = String::new();

        'read: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                Error::upstream(SERVICE, UpstreamKind::Network, None, e.to_string())
            })?;
            buffer.extend_from_slice(&chunk);

            while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=line_end).collect();
                let line = String::from_utf8_lossy(&line);
                if apply_sse_line(line.trim_end(), &mut reply, &mut on_chunk)? {
                    break 'read;
                }
            }
        }

        if reply.is_empty() {
            return Err(invalid("stream ended without text"));
        }
        debug!(chars = reply.len(), "Streamed reply received");
        Ok(reply)
    }
}
