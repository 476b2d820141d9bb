//! Heuristic AI-detection scoring
//!
//! Asks the model how likely a text is to be flagged as machine-written and
//! parses a 0-100 integer from the reply. The score is advisory only and
//! never gates a request.

use crate::llm::{ChatMessage, CompletionProvider, CompletionRequest, UpstreamError};
use std::sync::Arc;
use tracing::warn;

/// Score used when the model reply or the call itself is unusable
pub const FALLBACK_SCORE: u8 = 50;

const SCORING_PROMPT: &str = "You are an AI detection analyzer. Analyze the given text and \
provide a probability score (0-100) indicating how likely this text is to be detected as \
AI-generated. Consider factors like: repetitive patterns, overly formal language, lack of \
personal touches, perfect grammar, generic phrasing, and structured formatting. Respond with \
ONLY a number between 0-100, where 0 means definitely human-written and 100 means definitely \
AI-generated.";

const SCORING_TEMPERATURE: f32 = 0.1;
const SCORING_MAX_TOKENS: u32 = 10;

/// Parse the first run of ASCII digits in `reply`, clamped to `[0, 100]`
///
/// Returns `None` if the reply contains no digits.
pub fn parse_score(reply: &str) -> Option<u8> {
    let digits: String = reply
        .trim()
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    if digits.is_empty() {
        return None;
    }

    // Runs too long for u64 are far above 100 anyway
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    Some(value.min(100) as u8)
}

/// Detection scorer bound to one provider and model
#[derive(Clone)]
pub struct DetectionScorer {
    provider: Arc<dyn CompletionProvider>,
    model: String,
}

impl DetectionScorer {
    pub fn new(provider: Arc<dyn CompletionProvider>, model: impl Into<String>) -> Self {
        Self { provider, model: model.into() }
    }

    pub fn build_request(&self, text: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(SCORING_PROMPT), ChatMessage::user(text)],
            temperature: SCORING_TEMPERATURE,
            max_tokens: SCORING_MAX_TOKENS,
            top_p: None,
        }
    }

    /// Score `text`, surfacing transport failures
    ///
    /// A reply without digits is not an error; it yields [`FALLBACK_SCORE`].
    pub async fn try_score(&self, text: &str) -> Result<u8, UpstreamError> {
        let reply = self.provider.complete(&self.build_request(text)).await?;
        Ok(parse_score(&reply).unwrap_or(FALLBACK_SCORE))
    }

    /// Score `text`, never failing
    pub async fn score(&self, text: &str) -> u8 {
        match self.try_score(text).await {
            Ok(score) => score,
            Err(e) => {
                warn!("Detection scoring via {} failed, using {}: {}", self.provider.name(), FALLBACK_SCORE, e);
                FALLBACK_SCORE
            }
        }
    }
}
