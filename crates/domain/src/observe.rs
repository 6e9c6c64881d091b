//! Structured observability events and metrics.
//!
//! Observer implementations live in `cq-observer`; the vocabulary lives
//! here so the runtime can emit events without depending on any sink.

use serde::Serialize;

/// Direction of a channel message, from the runtime's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// A structured event recorded during an agent run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum ObserverEvent {
    /// An agent run began.
    AgentStart { provider: String, model: String },

    /// A request is about to be sent to the LLM.
    LlmRequest {
        provider: String,
        model: String,
        message_count: usize,
    },

    /// The LLM call finished (successfully or not).
    LlmResponse {
        provider: String,
        model: String,
        duration_ms: u64,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// The agent run finished.
    AgentEnd {
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        tokens_used: Option<u64>,
    },

    /// A tool is about to execute.
    ToolCallStart { tool: String },

    /// A tool finished executing.
    ToolCall {
        tool: String,
        duration_ms: u64,
        success: bool,
    },

    /// One full reason-act turn completed.
    TurnComplete,

    /// A message crossed a channel boundary.
    ChannelMessage { channel: String, direction: Direction },
}

impl ObserverEvent {
    /// Span name for trace exporters, derived from the event kind.
    pub fn span_name(&self) -> &'static str {
        match self {
            ObserverEvent::AgentStart { .. } => "agent.start",
            ObserverEvent::LlmRequest { .. } => "llm.request",
            ObserverEvent::LlmResponse { .. } => "llm.response",
            ObserverEvent::AgentEnd { .. } => "agent.run",
            ObserverEvent::ToolCallStart { .. } => "tool.call.start",
            ObserverEvent::ToolCall { .. } => "tool.call",
            ObserverEvent::TurnComplete => "turn.complete",
            ObserverEvent::ChannelMessage { .. } => "channel.message",
        }
    }

    /// The `success` flag, for events that carry one.
    pub fn success(&self) -> Option<bool> {
        match self {
            ObserverEvent::LlmResponse { success, .. } => Some(*success),
            ObserverEvent::ToolCall { success, .. } => Some(*success),
            _ => None,
        }
    }
}

/// A numeric metric recorded alongside events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverMetric {
    RequestLatencyMs,
    TokensUsed,
    ActiveSessions,
}

impl ObserverMetric {
    pub fn name(&self) -> &'static str {
        match self {
            ObserverMetric::RequestLatencyMs => "request_latency_ms",
            ObserverMetric::TokensUsed => "tokens_used",
            ObserverMetric::ActiveSessions => "active_sessions",
        }
    }
}
