//! Humanizing rewrite, streamed or in one piece

use crate::llm::{ChatMessage, ChunkStream, CompletionProvider, CompletionRequest, UpstreamError};
use futures::future;
use futures::stream::StreamExt;
use std::sync::Arc;
use tracing::debug;

const MAX_OUTPUT_TOKENS: u32 = 4096;
const TOP_P: f32 = 0.9;

const FORMAT_CONSTRAINTS: &str = "Keep the output length similar to the input (within 20% \
variance). Do not add extra paragraphs or content. Focus on making it sound human and natural. \
Respond only with the rewritten text, no additional commentary.";

/// Rewrite aggressiveness, bucketed from the 0-100 dial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    Low,
    Medium,
    High,
}

impl Strength {
    /// `0..=33` low, `34..=66` medium, `67..=100` high
    pub fn from_dial(dial: u8) -> Self {
        match dial.min(100) {
            0..=33 => Strength::Low,
            34..=66 => Strength::Medium,
            _ => Strength::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strength::Low => "low",
            Strength::Medium => "medium",
            Strength::High => "high",
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            Strength::Low => {
                "Lightly rewrite this text to sound more natural and human-like while keeping \
                 the same meaning and structure. Make subtle changes to word choice and sentence \
                 flow."
            }
            Strength::Medium => {
                "Rewrite this text to sound like it was written by a real person - casual but \
                 intelligent, natural and conversational. Add some personality while maintaining \
                 professionalism."
            }
            Strength::High => {
                "Completely rewrite this text to sound authentically human - imperfect, \
                 expressive, and natural. Make it bypass AI detection while keeping the core \
                 message. Use varied sentence structures, contractions, and natural language \
                 patterns."
            }
        }
    }

    pub fn system_prompt(self) -> String {
        format!("{} {}", self.instruction(), FORMAT_CONSTRAINTS)
    }
}

/// Clamp a raw dial value from a request body into `0..=100`
pub fn clamp_dial(raw: f64) -> u8 {
    if raw.is_nan() {
        return 50;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

/// Sampling temperature, linear from 0.7 at dial 0 to 1.0 at dial 100
pub fn temperature(dial: u8) -> f32 {
    let t = 0.7 + f64::from(dial.min(100)) / 100.0 * 0.3;
    t.min(1.0) as f32
}

/// Output token budget: twice the input word count, capped
pub fn max_tokens(word_count: u64) -> u32 {
    word_count
        .saturating_mul(2)
        .min(u64::from(MAX_OUTPUT_TOKENS)) as u32
}

#[derive(Clone)]
pub struct Rewriter {
    provider: Arc<dyn CompletionProvider>,
    model: String,
}

impl Rewriter {
    pub fn new(provider: Arc<dyn CompletionProvider>, model: impl Into<String>) -> Self {
        Self { provider, model: model.into() }
    }

    pub fn build_request(&self, text: &str, dial: u8) -> CompletionRequest {
        let strength = Strength::from_dial(dial);
        let word_count = hmz_common::text::word_count(text);

        CompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(strength.system_prompt()), ChatMessage::user(text)],
            temperature: temperature(dial),
            max_tokens: max_tokens(word_count),
            top_p: Some(TOP_P),
        }
    }

    /// Open a streaming rewrite
    ///
    /// The returned stream is lazy and single-pass; empty chunks are dropped.
    pub async fn stream(&self, text: &str, dial: u8) -> Result<ChunkStream, UpstreamError> {
        let request = self.build_request(text, dial);
        debug!(
            "Opening rewrite stream via {} (strength {}, temperature {:.2}, max_tokens {})",
            self.provider.name(),
            Strength::from_dial(dial).as_str(),
            request.temperature,
            request.max_tokens
        );

        let chunks = self.provider.open_stream(&request).await?;
        Ok(chunks
            .filter(|chunk| future::ready(!matches!(chunk, Ok(s) if s.is_empty())))
            .boxed())
    }

    /// Rewrite in one non-streaming call
    ///
    /// The reply is returned as sent, matching the concatenated stream; only
    /// a blank reply is an error.
    pub async fn rewrite(&self, text: &str, dial: u8) -> Result<String, UpstreamError> {
        let request = self.build_request(text, dial);
        let reply = self.provider.complete(&request).await?;
        if reply.trim().is_empty() {
            return Err(UpstreamError::EmptyOutput);
        }
        Ok(reply)
    }
}
