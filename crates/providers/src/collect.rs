//! Stream aggregation.
//!
//! Consumes a provider event stream, feeds every user-visible fragment
//! to the chunk sink as it arrives, assembles slot-keyed partial tool
//! calls, and returns one typed outcome.  Living here (rather than in
//! each caller) guarantees both wire families aggregate identically.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::StreamExt;

use cq_domain::error::{Error, Result};
use cq_domain::message::ToolCall;
use cq_domain::stream::{BoxStream, StreamEvent, Usage};

/// Callback invoked with each streamed text fragment.  Runs on the
/// worker driving the agent; must be fast and must not take locks the
/// task handler holds.
pub type ChunkSink = Arc<dyn Fn(&str) + Send + Sync>;

/// The aggregated result of one streamed LLM call.
#[derive(Debug, Default)]
pub struct ChatOutcome {
    /// Concatenated assistant text, `None` when the turn produced none.
    pub text: Option<String>,
    /// Finalized tool calls in provider order.
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

#[derive(Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Drain the stream into a [`ChatOutcome`].
///
/// - `Token` and `Thinking` fragments go to the sink as they arrive;
///   only `Token` text lands in the outcome.
/// - Malformed in-stream JSON was already mapped to `Error::Json` by the
///   parser; those lines are logged and skipped, the stream continues.
/// - An in-stream provider error aborts with `Error::Provider` after
///   reporting the message to the sink once.
/// - A stream that closes mid-call yields tool calls whose arguments
///   are the accumulated prefix.
pub async fn collect_stream(
    provider_id: &str,
    mut stream: BoxStream<'static, Result<StreamEvent>>,
    sink: Option<&ChunkSink>,
) -> Result<ChatOutcome> {
    let mut text = String::new();
    let mut slots: BTreeMap<u64, PartialCall> = BTreeMap::new();
    let mut usage: Option<Usage> = None;

    while let Some(event) = stream.next().await {
        match event {
            Ok(StreamEvent::Token { text: fragment }) => {
                if let Some(sink) = sink {
                    sink(&fragment);
                }
                text.push_str(&fragment);
            }
            Ok(StreamEvent::Thinking { text: fragment }) => {
                if let Some(sink) = sink {
                    sink(&fragment);
                }
            }
            Ok(StreamEvent::ToolCallStarted {
                slot,
                call_id,
                tool_name,
            }) => {
                let partial = slots.entry(slot).or_default();
                partial.id = call_id;
                partial.name = tool_name;
            }
            Ok(StreamEvent::ToolCallDelta { slot, partial }) => {
                slots.entry(slot).or_default().arguments.push_str(&partial);
            }
            Ok(StreamEvent::ToolCallStop { slot: _ }) => {
                // The slot stays in the map; ordering is by slot key.
            }
            Ok(StreamEvent::Done {
                usage: stream_usage,
                finish_reason: _,
            }) => {
                usage = stream_usage;
                break;
            }
            Ok(StreamEvent::Error { message }) => {
                // Reporting to the sink is the caller's job — it owns
                // the once-only emission for every transport failure.
                return Err(Error::Provider {
                    provider: provider_id.to_owned(),
                    message,
                });
            }
            Err(Error::Json(e)) => {
                tracing::warn!(provider = provider_id, error = %e, "skipping malformed stream line");
            }
            Err(e) => return Err(e),
        }
    }

    let tool_calls: Vec<ToolCall> = slots
        .into_values()
        .filter(|p| !p.id.is_empty() || !p.name.is_empty() || !p.arguments.is_empty())
        .map(|p| ToolCall {
            id: p.id,
            name: p.name,
            arguments: p.arguments,
        })
        .collect();

    Ok(ChatOutcome {
        text: if text.is_empty() { None } else { Some(text) },
        tool_calls,
        usage,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn stream_of(events: Vec<Result<StreamEvent>>) -> BoxStream<'static, Result<StreamEvent>> {
        Box::pin(futures_util::stream::iter(events))
    }

    fn recording_sink() -> (ChunkSink, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_sink = seen.clone();
        let sink: ChunkSink = Arc::new(move |chunk: &str| {
            seen_in_sink.lock().push(chunk.to_owned());
        });
        (sink, seen)
    }

    #[tokio::test]
    async fn tokens_concatenate_and_reach_the_sink() {
        let (sink, seen) = recording_sink();
        let stream = stream_of(vec![
            Ok(StreamEvent::Token { text: "p".into() }),
            Ok(StreamEvent::Token { text: "o".into() }),
            Ok(StreamEvent::Token { text: "n".into() }),
            Ok(StreamEvent::Token { text: "g".into() }),
            Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            }),
        ]);

        let outcome = collect_stream("test", stream, Some(&sink)).await.unwrap();
        assert_eq!(outcome.text.as_deref(), Some("pong"));
        assert!(outcome.tool_calls.is_empty());
        assert_eq!(seen.lock().as_slice(), ["p", "o", "n", "g"]);
    }

    #[tokio::test]
    async fn tool_calls_assemble_in_slot_order() {
        let stream = stream_of(vec![
            Ok(StreamEvent::ToolCallStarted {
                slot: 1,
                call_id: "t2".into(),
                tool_name: "second".into(),
            }),
            Ok(StreamEvent::ToolCallStarted {
                slot: 0,
                call_id: "t1".into(),
                tool_name: "first".into(),
            }),
            Ok(StreamEvent::ToolCallDelta {
                slot: 0,
                partial: "{\"a\":".into(),
            }),
            Ok(StreamEvent::ToolCallDelta {
                slot: 0,
                partial: "1}".into(),
            }),
            Ok(StreamEvent::ToolCallStop { slot: 0 }),
            Ok(StreamEvent::ToolCallStop { slot: 1 }),
            Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("tool_calls".into()),
            }),
        ]);

        let outcome = collect_stream("test", stream, None).await.unwrap();
        assert_eq!(outcome.tool_calls.len(), 2);
        assert_eq!(outcome.tool_calls[0].id, "t1");
        assert_eq!(outcome.tool_calls[0].arguments, "{\"a\":1}");
        assert_eq!(outcome.tool_calls[1].id, "t2");
    }

    #[tokio::test]
    async fn truncated_stream_keeps_partial_arguments() {
        // No Stop, no Done: the body just ends.
        let stream = stream_of(vec![
            Ok(StreamEvent::ToolCallStarted {
                slot: 0,
                call_id: "t1".into(),
                tool_name: "add".into(),
            }),
            Ok(StreamEvent::ToolCallDelta {
                slot: 0,
                partial: "{\"a\":2,\"b".into(),
            }),
        ]);

        let outcome = collect_stream("test", stream, None).await.unwrap();
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(outcome.tool_calls[0].arguments, "{\"a\":2,\"b");
    }

    #[tokio::test]
    async fn json_errors_skip_but_stream_continues() {
        let bad = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let stream = stream_of(vec![
            Err(Error::Json(bad)),
            Ok(StreamEvent::Token { text: "ok".into() }),
            Ok(StreamEvent::Done {
                usage: None,
                finish_reason: None,
            }),
        ]);

        let outcome = collect_stream("test", stream, None).await.unwrap();
        assert_eq!(outcome.text.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn in_stream_error_aborts_with_provider_error() {
        let (sink, seen) = recording_sink();
        let stream = stream_of(vec![Ok(StreamEvent::Error {
            message: "overloaded".into(),
        })]);

        let err = collect_stream("claude", stream, Some(&sink)).await.unwrap_err();
        match err {
            Error::Provider { provider, message } => {
                assert_eq!(provider, "claude");
                assert_eq!(message, "overloaded");
            }
            other => panic!("expected Provider error, got {other}"),
        }
        // The caller owns user-facing reporting; nothing reached the sink.
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn thinking_reaches_sink_but_not_text() {
        let (sink, seen) = recording_sink();
        let stream = stream_of(vec![
            Ok(StreamEvent::Thinking { text: "hmm ".into() }),
            Ok(StreamEvent::Token { text: "answer".into() }),
            Ok(StreamEvent::Done {
                usage: None,
                finish_reason: None,
            }),
        ]);

        let outcome = collect_stream("test", stream, Some(&sink)).await.unwrap();
        assert_eq!(outcome.text.as_deref(), Some("answer"));
        assert_eq!(seen.lock().as_slice(), ["hmm ", "answer"]);
    }
}
