//! Streaming event vocabulary shared by the provider adapters.

use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for LLM streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted while an LLM response streams in (provider-agnostic).
///
/// Tool-call events are keyed by `slot` — the provider's positional key
/// for a partial tool call (OpenAI `tool_calls[].index`, Anthropic
/// content-block index) — so started/delta/stop events for one call
/// always share a key even when the provider omits the call id on
/// later deltas.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// A user-visible text fragment.
    #[serde(rename = "token")]
    Token { text: String },

    /// A reasoning-trace fragment (streamed to the caller, kept out of
    /// the assistant message).
    #[serde(rename = "thinking")]
    Thinking { text: String },

    /// A tool call opened at `slot` with its id and name.
    #[serde(rename = "tool_call_started")]
    ToolCallStarted {
        slot: u64,
        call_id: String,
        tool_name: String,
    },

    /// Incremental argument JSON for the tool call at `slot`.
    #[serde(rename = "tool_call_delta")]
    ToolCallDelta { slot: u64, partial: String },

    /// The tool call at `slot` is complete.
    #[serde(rename = "tool_call_stop")]
    ToolCallStop { slot: u64 },

    /// Stream finished.
    #[serde(rename = "done")]
    Done {
        usage: Option<Usage>,
        finish_reason: Option<String>,
    },

    /// The provider reported an in-stream error.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Token usage for a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
