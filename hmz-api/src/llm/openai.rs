//! OpenAI-compatible chat completions client
//!
//! Speaks the `/chat/completions` wire format used by Groq, OpenAI and most
//! self-hosted gateways. Streaming responses are parsed incrementally from
//! the provider's SSE body.

use super::{sse, ChunkStream, CompletionProvider, CompletionRequest, UpstreamError};
use async_trait::async_trait;
use futures::stream::StreamExt;
use hmz_common::config::LlmConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on establishing a connection; streams themselves have no timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest provider error body kept in error messages
const MAX_ERROR_BODY: usize = 500;

/// Client for an OpenAI-compatible endpoint
pub struct OpenAiCompatClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    /// Applied to non-streaming calls only
    request_timeout: Duration,
}

impl OpenAiCompatClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let http_client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| UpstreamError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            request_timeout,
        })
    }

    /// Build from config, `None` when no API key is configured
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>, UpstreamError> {
        match config.api_key() {
            Some(key) => Self::new(
                config.base_url.clone(),
                key,
                Duration::from_secs(config.timeout_secs),
            )
            .map(Some),
            None => Ok(None),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, UpstreamError> {
        let body = WireRequest::from_request(request, stream);
        let mut builder = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body);
        if !stream {
            builder = builder.timeout(self.request_timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = provider_error_message(&body);
        warn!("Provider returned {} for model {}: {}", status, request.model, message);
        Err(UpstreamError::from_status(status.as_u16(), message))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatClient {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError> {
        let response = self.send(request, false).await?;
        let completion: WireCompletion = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default();

        debug!("Completion received: {} chars", text.len());
        Ok(text)
    }

    async fn open_stream(&self, request: &CompletionRequest) -> Result<ChunkStream, UpstreamError> {
        let response = self.send(request, true).await?;
        let bytes = response.bytes_stream().map(|chunk| chunk.map_err(UpstreamError::from));
        let payloads = sse::data_payloads(bytes);

        let chunks = async_stream::try_stream! {
            let mut payloads = Box::pin(payloads);
            while let Some(data) = payloads.next().await {
                let data = data?;
                if data.trim() == "[DONE]" {
                    break;
                }

                let chunk: WireChunk = serde_json::from_str(&data)
                    .map_err(|e| UpstreamError::Decode(format!("{}: {}", e, truncate(&data))))?;

                if let Some(error) = chunk.error {
                    Err(UpstreamError::Model(error.message))?;
                }

                let text = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta)
                    .and_then(|delta| delta.content)
                    .unwrap_or_default();
                if !text.is_empty() {
                    yield text;
                }
            }
        };

        Ok(Box::pin(chunks))
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [super::ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

impl<'a> WireRequest<'a> {
    fn from_request(request: &'a CompletionRequest, stream: bool) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
            stream,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireCompletion {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: Option<WireContent>,
}

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireChunkChoice>,
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireChunkChoice {
    delta: Option<WireContent>,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    error: WireError,
}

/// Prefer the provider's `{"error": {"message": ...}}`, else the raw body
fn provider_error_message(body: &str) -> String {
    serde_json::from_str::<WireErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| truncate(body))
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_ERROR_BODY).collect()
}
