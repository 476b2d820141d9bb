//! Upstream Server-Sent Events parsing
//!
//! Turns the provider's response body (arbitrary byte chunks) into the
//! payloads of its `data:` fields, one item per SSE event. Only the framing
//! is handled here; JSON decoding of payloads happens in the client.

use super::UpstreamError;
use futures::stream::{Stream, StreamExt};

/// Yield the joined `data:` payload of each event in `byte_stream`
///
/// Bytes are buffered until a blank line completes an event, so multi-byte
/// UTF-8 sequences split across chunks decode correctly. Events with no
/// `data:` field (comments, keep-alives) are skipped.
pub fn data_payloads<S, B>(byte_stream: S) -> impl Stream<Item = Result<String, UpstreamError>> + Send
where
    S: Stream<Item = Result<B, UpstreamError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    async_stream::try_stream! {
        let mut byte_stream = Box::pin(byte_stream);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk?;
            // CRLF line endings are folded to LF; a literal CR never appears
            // unescaped inside a JSON payload
            buffer.extend(chunk.as_ref().iter().copied().filter(|b| *b != b'\r'));

            while let Some(pos) = find_blank_line(&buffer) {
                let block: Vec<u8> = buffer.drain(..pos + 2).collect();
                if let Some(data) = parse_block(&block[..pos]) {
                    yield data;
                }
            }
        }

        // Flush a final event that was not followed by a blank line
        if let Some(data) = parse_block(&buffer) {
            yield data;
        }
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_block(block: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(block);
    let mut data: Option<String> = None;

    for line in text.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            }
        }
    }

    data
}
