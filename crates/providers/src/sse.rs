//! Shared SSE streaming infrastructure for both provider families.
//!
//! The framing here is line-oriented: the buffer is scanned for the
//! earliest newline, one line is extracted, a trailing CR is stripped
//! and leading whitespace trimmed.  Only lines starting with `data:`
//! carry payloads; everything else (`event:`, `id:`, comments, blanks)
//! is ignored.
//!
//! Two pieces:
//! - [`drain_data_lines`] — pull complete `data:` payloads from a buffer
//! - [`sse_response_stream`] — build a `BoxStream` from a response + a
//!   provider-specific parser closure

use crate::util::from_reqwest;
use cq_domain::error::Result;
use cq_domain::stream::{BoxStream, StreamEvent};

/// Extract complete `data:` payloads from the buffer.
///
/// The buffer is drained in-place: consumed lines are removed and any
/// trailing partial line remains for the next call.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find('\n') {
        let mut line: String = buffer.drain(..=pos).collect();
        line.pop(); // the \n
        if line.ends_with('\r') {
            line.pop();
        }

        let line = line.trim_start();
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            if !data.is_empty() {
                data_lines.push(data.to_string());
            }
        }
    }

    data_lines
}

/// Build a [`BoxStream`] from an SSE `reqwest::Response` and a
/// provider-specific parser closure.
///
/// The closure receives each `data:` payload and returns zero or more
/// stream events.  It is `FnMut` because the Anthropic parser carries
/// tool-call assembly state across calls.
///
/// The stream:
/// 1. buffers incoming chunks and drains complete lines
/// 2. stops consuming as soon as the parser emits `Done` — bytes after
///    a terminator (e.g. `[DONE]`) are discarded
/// 3. flushes a trailing unterminated line when the body closes
/// 4. emits a fallback `Done` if the parser never produced one
pub(crate) fn sse_response_stream<F>(
    response: reqwest::Response,
    mut parse_data: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();
        let mut done_emitted = false;

        'read: loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));

                    for data in drain_data_lines(&mut buffer) {
                        for event in parse_data(&data) {
                            let is_done = matches!(&event, Ok(StreamEvent::Done { .. }));
                            yield event;
                            if is_done {
                                done_emitted = true;
                                break 'read;
                            }
                        }
                    }
                }
                Ok(None) => {
                    // Body closed — flush a trailing unterminated line.
                    if !buffer.trim().is_empty() {
                        buffer.push('\n');
                        for data in drain_data_lines(&mut buffer) {
                            for event in parse_data(&data) {
                                let is_done = matches!(&event, Ok(StreamEvent::Done { .. }));
                                yield event;
                                if is_done {
                                    done_emitted = true;
                                    break 'read;
                                }
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }

        if !done_emitted {
            yield Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            });
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_single_complete_line() {
        let mut buf = String::from("data: {\"hello\":\"world\"}\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["{\"hello\":\"world\"}"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_strips_trailing_cr() {
        let mut buf = String::from("data: payload\r\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["payload"]);
    }

    #[test]
    fn drain_trims_leading_whitespace() {
        let mut buf = String::from("   data: payload\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["payload"]);
    }

    #[test]
    fn drain_partial_line_stays_in_buffer() {
        let mut buf = String::from("data: complete\ndata: partial");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["complete"]);
        assert_eq!(buf, "data: partial");
    }

    #[test]
    fn drain_ignores_non_data_lines() {
        let mut buf = String::from("event: ping\nid: 42\nretry: 5000\ndata: payload\n\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["payload"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_skips_empty_data_lines() {
        let mut buf = String::from("data: \n");
        let lines = drain_data_lines(&mut buf);
        assert!(lines.is_empty());
    }

    #[test]
    fn drain_done_sentinel_preserved() {
        let mut buf = String::from("data: [DONE]\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["[DONE]"]);
    }

    #[test]
    fn drain_incremental_buffering() {
        let mut buf = String::from("data: chu");
        assert!(drain_data_lines(&mut buf).is_empty());
        assert_eq!(buf, "data: chu");

        buf.push_str("nk1\ndata: chunk2\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["chunk1", "chunk2"]);
        assert!(buf.is_empty());
    }
}
