//! Server-Sent Events (SSE) utilities
//!
//! Frames are `data: <json>\n\n`; the stream ends with `data: [DONE]\n\n`.
//! No `event:` line is written, clients switch on the JSON `type` field.

use crate::events::StreamEvent;
use axum::http::header::{HeaderName, HeaderValue, CACHE_CONTROL, CONNECTION};
use axum::response::sse::Event;
use tracing::warn;

/// Payload of the terminal frame
pub const DONE_SENTINEL: &str = "[DONE]";

/// Convert an event into an axum SSE event
///
/// Serialization of these plain structs cannot realistically fail; if it
/// does, an `error` frame with the same request id is sent instead.
pub fn to_sse_event(event: &StreamEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().data(json),
        Err(e) => {
            warn!("SSE: Failed to serialize event {}: {}", event.event_type(), e);
            let fallback = format!(
                r#"{{"type":"error","error":"Streaming failed","requestId":{}}}"#,
                serde_json::Value::String(event.request_id().to_string())
            );
            Event::default().data(fallback)
        }
    }
}

/// Terminal `[DONE]` event
pub fn done_event() -> Event {
    Event::default().data(DONE_SENTINEL)
}

/// Extra headers sent with every event stream
///
/// `Content-Type: text/event-stream` is added by axum's `Sse` response.
pub fn stream_headers() -> [(HeaderName, HeaderValue); 2] {
    [
        (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        (CONNECTION, HeaderValue::from_static("keep-alive")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_headers() {
        let headers = stream_headers();
        assert_eq!(headers[0].0, CACHE_CONTROL);
        assert_eq!(headers[0].1, "no-cache");
        assert_eq!(headers[1].0, CONNECTION);
        assert_eq!(headers[1].1, "keep-alive");
    }
}
