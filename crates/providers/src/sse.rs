//! SSE decoding for streaming chat-completion responses.
//!
//! Receives a `reqwest::Response`, buffers chunks, splits on `\n\n`, pulls
//! the `data:` payloads out, and hands each to a parser that turns it into
//! zero or more text fragments.
//!
//! - [`drain_data_lines`] -- pull complete `data:` payloads from an SSE buffer
//! - [`sse_fragment_stream`] -- build a [`FragmentStream`] from a response + parser

use crate::util::from_reqwest;
use ps_domain::error::Result;
use ps_domain::stream::FragmentStream;

/// What the parser made of one `data:` payload.
pub(crate) enum SseStep {
    /// Zero or more fragments; keep reading.
    Fragments(Vec<Result<String>>),
    /// End-of-stream sentinel (`[DONE]`).
    Done,
}

/// Extract complete `data:` payloads from an SSE buffer.
///
/// Only `data:` lines matter; `event:`, `id:` and `retry:` are dropped.
/// The buffer is drained in place and a trailing partial event stays for
/// the next call.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2);

        for line in block.lines() {
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_string());
                }
            }
        }
    }

    data_lines
}

/// Build a [`FragmentStream`] from an SSE response and a payload parser.
///
/// The stream ends at the `[DONE]` sentinel, at the first parser error, or
/// when the body closes (after flushing any unterminated final event).
pub(crate) fn sse_fragment_stream<F>(response: reqwest::Response, mut parse_data: F) -> FragmentStream
where
    F: FnMut(&str) -> SseStep + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();

        'read: loop {
            let (data_lines, eof) = match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    (drain_data_lines(&mut buffer), false)
                }
                Ok(None) => {
                    // Body closed; flush an unterminated final event.
                    buffer.push_str("\n\n");
                    (drain_data_lines(&mut buffer), true)
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break 'read;
                }
            };

            for data in data_lines {
                match parse_data(&data) {
                    SseStep::Done => break 'read,
                    SseStep::Fragments(fragments) => {
                        for fragment in fragments {
                            let failed = fragment.is_err();
                            yield fragment;
                            if failed {
                                break 'read;
                            }
                        }
                    }
                }
            }
            if eof {
                break 'read;
            }
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
