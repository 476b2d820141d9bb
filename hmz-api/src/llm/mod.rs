//! Chat-completion provider abstraction
//!
//! The rest of the service talks to the model only through
//! [`CompletionProvider`], so the streaming pipeline and its tests never
//! depend on one vendor's client shape.

pub mod openai;
pub mod sse;

pub use openai::OpenAiCompatClient;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use thiserror::Error;

/// Lazy, single-pass sequence of generated text chunks
pub type ChunkStream = BoxStream<'static, Result<String, UpstreamError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// One completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: Option<f32>,
}

/// Capability interface over a chat-completion backend
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Single non-streaming completion, returning the reply text
    async fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError>;

    /// Open a streaming completion
    ///
    /// Errors before the first chunk (bad status, connect failure) are
    /// returned here; errors after that arrive as stream items.
    async fn open_stream(&self, request: &CompletionRequest) -> Result<ChunkStream, UpstreamError>;
}

/// Failure talking to the model provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Provider rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Provider rejected request: {0}")]
    BadRequest(String),

    #[error("Provider request timed out: {0}")]
    Timeout(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Provider returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    #[error("Empty output from model")]
    EmptyOutput,
}

impl UpstreamError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            429 => UpstreamError::RateLimited(message),
            401 => UpstreamError::Unauthorized(message),
            400 => UpstreamError::BadRequest(message),
            408 | 504 => UpstreamError::Timeout(message),
            _ if message.to_ascii_lowercase().contains("model") => UpstreamError::Model(message),
            _ => UpstreamError::Status { status, message },
        }
    }

    /// Short message safe to show to the end user
    pub fn user_message(&self) -> &'static str {
        match self {
            UpstreamError::RateLimited(_) => "Rate limit exceeded. Please wait a moment and try again.",
            UpstreamError::Unauthorized(_) => {
                "Authentication error with AI service. Please contact support."
            }
            UpstreamError::BadRequest(_) => "Invalid request. Please check your input and try again.",
            UpstreamError::Timeout(_) | UpstreamError::Transport(_) => {
                "Connection timeout. Please try again."
            }
            UpstreamError::Model(_) => "AI model error. Please try again or contact support.",
            UpstreamError::EmptyOutput => "Failed to generate humanized text",
            UpstreamError::Status { .. } | UpstreamError::Decode(_) => {
                "Service temporarily unavailable. Please try again in a moment."
            }
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout(e.to_string())
        } else if e.is_decode() {
            UpstreamError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            UpstreamError::from_status(status.as_u16(), e.to_string())
        } else {
            UpstreamError::Transport(e.to_string())
        }
    }
}
