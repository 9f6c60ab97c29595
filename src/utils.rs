//! Low-level Server-Sent Events (SSE) framing shared by every provider
//! adapter.
//!
//! Every provider in this crate speaks the same transport-level SSE framing
//! (`data: <payload>\n\n`, terminated by `data: [DONE]` on OpenAI-family
//! servers); only the JSON payload shape differs per provider. This module
//! owns the framing so [`crate::adapter`] only has to parse payload JSON.

use crate::error::{Error, Result};
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;

/// Parses a raw HTTP response body as an SSE byte stream, yielding each
/// `data:` payload as a raw string. The `[DONE]` sentinel some providers send
/// to mark stream end is filtered out rather than yielded.
///
/// Chunk boundaries from the underlying HTTP stream don't align with SSE
/// event boundaries, so this does line-oriented scanning per chunk rather
/// than assuming one `bytes_stream()` item is one event. `from_utf8_lossy` is
/// used to tolerate a multi-byte UTF-8 sequence split across chunks.
pub fn parse_sse_lines(
    body: reqwest::Response,
) -> Pin<Box<dyn Stream<Item = Result<String>> + Send>> {
    let stream = body.bytes_stream().filter_map(move |result| async move {
        let bytes = match result.map_err(Error::Http) {
            Ok(b) => b,
            Err(e) => return Some(Err(e)),
        };

        let text = String::from_utf8_lossy(&bytes).into_owned();
        for line in text.lines() {
            if let Some(data) = line
                .strip_prefix("data: ")
                .or_else(|| line.strip_prefix("data:"))
            {
                let data = data.trim();
                if data == "[DONE]" || data.is_empty() {
                    continue;
                }
                return Some(Ok(data.to_string()));
            }
        }
        None
    });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    #[test]
    fn sse_framing_skips_done_sentinel_and_blank_events() {
        let raw = "data: {\"a\":1}\n\ndata: [DONE]\n\n";
        let mut payloads = Vec::new();
        for line in raw.lines() {
            if let Some(data) = line.strip_prefix("data: ") {
                if data != "[DONE]" && !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }
        assert_eq!(payloads, vec!["{\"a\":1}".to_string()]);
    }
}
