//! Stream event types
//!
//! Events exist only on the wire: one JSON object per SSE frame, tagged by a
//! `type` field. Field names are camelCase to match browser clients.

use crate::tier::Tier;
use serde::{Deserialize, Serialize};

/// Events emitted by the humanize stream, in protocol order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Detection score of the input, sent once after admission
    #[serde(rename_all = "camelCase")]
    InitialScore {
        score: u8,
        request_id: String,
    },

    /// One generation chunk, forwarded as received
    #[serde(rename_all = "camelCase")]
    Content {
        content: String,
        request_id: String,
    },

    /// Final summary once the rewrite finished and was recorded
    #[serde(rename_all = "camelCase")]
    Complete {
        final_score: u8,
        word_count: u64,
        tier: Tier,
        monthly_usage: u64,
        monthly_limit: u64,
        request_id: String,
        success: bool,
    },

    /// Terminal failure
    #[serde(rename_all = "camelCase")]
    Error {
        error: String,
        request_id: String,
    },
}

impl StreamEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::InitialScore { .. } => "initial_score",
            StreamEvent::Content { .. } => "content",
            StreamEvent::Complete { .. } => "complete",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// Request correlation id carried by every event
    pub fn request_id(&self) -> &str {
        match self {
            StreamEvent::InitialScore { request_id, .. }
            | StreamEvent::Content { request_id, .. }
            | StreamEvent::Complete { request_id, .. }
            | StreamEvent::Error { request_id, .. } => request_id,
        }
    }

    /// Whether no further events follow this one
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }
}
