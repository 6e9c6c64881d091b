//! Anthropic-native adapter.
//!
//! Implements the Anthropic Messages API: the system prompt moves to a
//! separate top-level `system` field, the messages array holds only
//! user/assistant entries, tool results become user messages carrying
//! `tool_result` content blocks, and tool invocations arrive as
//! `tool_use` content blocks assembled from streaming deltas.

use serde_json::Value;

use cq_domain::config::ProviderConfig;
use cq_domain::error::{Error, Result};
use cq_domain::message::{Message, Role, ToolDefinition};
use cq_domain::stream::{BoxStream, StreamEvent, Usage};

use crate::traits::{ChatRequest, LlmProvider};
use crate::util::{extract_error_message, from_reqwest, resolve_api_key};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const ANTHROPIC_VERSION: &str = "2023-06-01";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An adapter for the Anthropic Messages API and compatible gateways.
pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new adapter from the deserialized provider config.
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(cfg)?;
        let default_model = cfg
            .default_model
            .clone()
            .unwrap_or_else(|| "claude-sonnet-4-20250514".into());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            max_tokens: cfg.max_tokens,
            client,
        })
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    fn build_messages_body(&self, req: &ChatRequest) -> Value {
        let model = req
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        // System messages move to the top-level field.
        let mut system_parts: Vec<String> = Vec::new();
        let mut api_messages: Vec<Value> = Vec::new();

        for msg in &req.messages {
            match msg.role {
                Role::System => {
                    if let Some(content) = &msg.content {
                        system_parts.push(content.clone());
                    }
                }
                Role::User => api_messages.push(serde_json::json!({
                    "role": "user",
                    "content": msg.content.as_deref().unwrap_or(""),
                })),
                Role::Assistant => api_messages.push(assistant_to_anthropic(msg)),
                Role::Tool => api_messages.push(tool_result_to_anthropic(msg)),
            }
        }

        let mut body = serde_json::json!({
            "model": model,
            "messages": api_messages,
            "max_tokens": req.max_tokens.unwrap_or(self.max_tokens),
            "stream": true,
        });

        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_anthropic).collect();
            body["tools"] = Value::Array(tools);
        }

        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn assistant_to_anthropic(msg: &Message) -> Value {
    let mut content: Vec<Value> = Vec::new();

    if let Some(text) = &msg.content {
        if !text.is_empty() {
            content.push(serde_json::json!({ "type": "text", "text": text }));
        }
    }
    if let Some(tool_calls) = &msg.tool_calls {
        for tc in tool_calls {
            // The opaque argument string becomes the structured `input`
            // block; an unparseable prefix degrades to an empty object.
            let input: Value = serde_json::from_str(&tc.arguments)
                .unwrap_or_else(|_| Value::Object(Default::default()));
            content.push(serde_json::json!({
                "type": "tool_use",
                "id": tc.id,
                "name": tc.name,
                "input": input,
            }));
        }
    }

    serde_json::json!({ "role": "assistant", "content": content })
}

fn tool_result_to_anthropic(msg: &Message) -> Value {
    // Tool results are user messages with tool_result content blocks.
    serde_json::json!({
        "role": "user",
        "content": [{
            "type": "tool_result",
            "tool_use_id": msg.tool_call_id.as_deref().unwrap_or(""),
            "content": msg.content.as_deref().unwrap_or(""),
        }],
    })
}

fn tool_to_anthropic(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming SSE helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-stream assembly state.
#[derive(Default)]
struct StreamState {
    /// Prompt-token usage captured from message_start.
    usage: Option<Usage>,
    done_emitted: bool,
}

fn parse_anthropic_usage(v: &Value) -> Option<Usage> {
    let input = v.get("input_tokens").and_then(|t| t.as_u64()).unwrap_or(0) as u32;
    let output = v.get("output_tokens").and_then(|t| t.as_u64()).unwrap_or(0) as u32;
    if input == 0 && output == 0 {
        return None;
    }
    Some(Usage {
        prompt_tokens: input,
        completion_tokens: output,
        total_tokens: input + output,
    })
}

/// Parse a single Anthropic SSE data payload into zero or more events.
fn parse_anthropic_sse(data: &str, state: &mut StreamState) -> Vec<Result<StreamEvent>> {
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    let event_type = v.get("type").and_then(|t| t.as_str()).unwrap_or("");
    let mut events = Vec::new();

    match event_type {
        "message_start" => {
            if let Some(msg) = v.get("message") {
                state.usage = msg.get("usage").and_then(parse_anthropic_usage);
            }
        }

        "content_block_start" => {
            let slot = v.get("index").and_then(|i| i.as_u64()).unwrap_or(0);
            if let Some(block) = v.get("content_block") {
                if block.get("type").and_then(|t| t.as_str()) == Some("tool_use") {
                    let call_id = block
                        .get("id")
                        .and_then(|i| i.as_str())
                        .unwrap_or("")
                        .to_string();
                    let tool_name = block
                        .get("name")
                        .and_then(|n| n.as_str())
                        .unwrap_or("")
                        .to_string();
                    events.push(Ok(StreamEvent::ToolCallStarted {
                        slot,
                        call_id,
                        tool_name,
                    }));
                }
            }
        }

        "content_block_delta" => {
            let slot = v.get("index").and_then(|i| i.as_u64()).unwrap_or(0);
            if let Some(delta) = v.get("delta") {
                match delta.get("type").and_then(|t| t.as_str()).unwrap_or("") {
                    "text_delta" => {
                        if let Some(text) = delta.get("text").and_then(|t| t.as_str()) {
                            if !text.is_empty() {
                                events.push(Ok(StreamEvent::Token {
                                    text: text.to_string(),
                                }));
                            }
                        }
                    }
                    "thinking_delta" => {
                        if let Some(text) = delta.get("thinking").and_then(|t| t.as_str()) {
                            if !text.is_empty() {
                                events.push(Ok(StreamEvent::Thinking {
                                    text: text.to_string(),
                                }));
                            }
                        }
                    }
                    "input_json_delta" => {
                        if let Some(partial) =
                            delta.get("partial_json").and_then(|p| p.as_str())
                        {
                            if !partial.is_empty() {
                                events.push(Ok(StreamEvent::ToolCallDelta {
                                    slot,
                                    partial: partial.to_string(),
                                }));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        "content_block_stop" => {
            let slot = v.get("index").and_then(|i| i.as_u64()).unwrap_or(0);
            events.push(Ok(StreamEvent::ToolCallStop { slot }));
        }

        "message_delta" => {
            if let Some(output) = v
                .get("usage")
                .and_then(|u| u.get("output_tokens"))
                .and_then(|t| t.as_u64())
            {
                if let Some(ref mut usage) = state.usage {
                    usage.completion_tokens = output as u32;
                    usage.total_tokens = usage.prompt_tokens + usage.completion_tokens;
                }
            }
        }

        "message_stop" => {
            if !state.done_emitted {
                state.done_emitted = true;
                events.push(Ok(StreamEvent::Done {
                    usage: state.usage.clone(),
                    finish_reason: Some("stop".into()),
                }));
            }
        }

        "error" => {
            let message = v
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            events.push(Ok(StreamEvent::Error {
                message: message.to_string(),
            }));
        }

        _ => {
            // ping and unknown event types.
        }
    }

    events
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(req);

        tracing::debug!(provider = %self.id, url = %url, "anthropic stream request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {}: {}", status.as_u16(), extract_error_message(&err_text)),
            });
        }

        let mut state = StreamState::default();
        Ok(crate::sse::sse_response_stream(resp, move |data| {
            parse_anthropic_sse(data, &mut state)
        }))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use cq_domain::message::ToolCall;

    fn provider() -> AnthropicProvider {
        AnthropicProvider {
            id: "claude".into(),
            base_url: "https://api.anthropic.com".into(),
            api_key: "test".into(),
            default_model: "claude-sonnet-4-20250514".into(),
            max_tokens: 4096,
            client: reqwest::Client::new(),
        }
    }

    #[test]
    fn system_prompt_moves_to_top_level() {
        let req = ChatRequest {
            messages: vec![Message::system("be terse"), Message::user("hi")],
            ..Default::default()
        };
        let body = provider().build_messages_body(&req);

        assert_eq!(body["system"], "be terse");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn tool_result_becomes_user_content_block() {
        let req = ChatRequest {
            messages: vec![Message::tool_result("t1", "5")],
            ..Default::default()
        };
        let body = provider().build_messages_body(&req);

        let block = &body["messages"][0];
        assert_eq!(block["role"], "user");
        assert_eq!(block["content"][0]["type"], "tool_result");
        assert_eq!(block["content"][0]["tool_use_id"], "t1");
        assert_eq!(block["content"][0]["content"], "5");
    }

    #[test]
    fn assistant_tool_calls_become_tool_use_blocks() {
        let msg = Message::assistant_with_tools(
            Some("let me check".into()),
            vec![ToolCall {
                id: "t1".into(),
                name: "add".into(),
                arguments: r#"{"a":2,"b":3}"#.into(),
            }],
        );
        let v = assistant_to_anthropic(&msg);

        let content = v["content"].as_array().unwrap();
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "tool_use");
        assert_eq!(content[1]["input"]["a"], 2);
    }

    #[test]
    fn tool_use_block_start_opens_a_slot() {
        let mut state = StreamState::default();
        let events = parse_anthropic_sse(
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"tu_1","name":"add"}}"#,
            &mut state,
        );
        assert!(matches!(
            events[0].as_ref().unwrap(),
            StreamEvent::ToolCallStarted { slot: 1, call_id, tool_name }
                if call_id == "tu_1" && tool_name == "add"
        ));
    }

    #[test]
    fn deltas_route_by_type() {
        let mut state = StreamState::default();

        let text = parse_anthropic_sse(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"pong"}}"#,
            &mut state,
        );
        assert!(matches!(
            text[0].as_ref().unwrap(),
            StreamEvent::Token { text } if text == "pong"
        ));

        let thinking = parse_anthropic_sse(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"hmm"}}"#,
            &mut state,
        );
        assert!(matches!(
            thinking[0].as_ref().unwrap(),
            StreamEvent::Thinking { text } if text == "hmm"
        ));

        let args = parse_anthropic_sse(
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"a\":2"}}"#,
            &mut state,
        );
        assert!(matches!(
            args[0].as_ref().unwrap(),
            StreamEvent::ToolCallDelta { slot: 1, partial } if partial == "{\"a\":2"
        ));
    }

    #[test]
    fn message_stop_emits_done_with_usage() {
        let mut state = StreamState::default();
        parse_anthropic_sse(
            r#"{"type":"message_start","message":{"usage":{"input_tokens":12,"output_tokens":1}}}"#,
            &mut state,
        );
        parse_anthropic_sse(
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":9}}"#,
            &mut state,
        );
        let events = parse_anthropic_sse(r#"{"type":"message_stop"}"#, &mut state);

        match events[0].as_ref().unwrap() {
            StreamEvent::Done { usage, .. } => {
                let usage = usage.as_ref().unwrap();
                assert_eq!(usage.prompt_tokens, 12);
                assert_eq!(usage.completion_tokens, 9);
                assert_eq!(usage.total_tokens, 21);
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[test]
    fn in_stream_error_event_surfaces() {
        let mut state = StreamState::default();
        let events = parse_anthropic_sse(
            r#"{"type":"error","error":{"type":"overloaded_error","message":"overloaded"}}"#,
            &mut state,
        );
        assert!(matches!(
            events[0].as_ref().unwrap(),
            StreamEvent::Error { message } if message == "overloaded"
        ));
    }

    #[test]
    fn ping_is_ignored() {
        let mut state = StreamState::default();
        assert!(parse_anthropic_sse(r#"{"type":"ping"}"#, &mut state).is_empty());
    }
}
