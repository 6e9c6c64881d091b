//! OpenAI-compatible adapter.
//!
//! Works with OpenRouter, Groq, and any gateway that follows the OpenAI
//! chat-completions contract.  Tool calls ride on assistant messages as
//! `tool_calls`; tool results are `role: "tool"` messages carrying a
//! `tool_call_id`; the stream terminates on the `[DONE]` sentinel.

use serde_json::Value;

use cq_domain::config::ProviderConfig;
use cq_domain::error::{Error, Result};
use cq_domain::message::{Message, Role, ToolDefinition};
use cq_domain::stream::{BoxStream, StreamEvent, Usage};

use crate::traits::{ChatRequest, LlmProvider};
use crate::util::{extract_error_message, from_reqwest, resolve_api_key};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An adapter for any OpenAI-compatible streaming endpoint.
pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    max_tokens: u32,
    client: reqwest::Client,
    /// OpenRouter wants attribution headers on every request.
    is_openrouter: bool,
}

impl OpenAiCompatProvider {
    /// Create a new adapter from the deserialized provider config.
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(cfg)?;
        let default_model = cfg.default_model.clone().unwrap_or_else(|| "gpt-4o".into());
        let base_url = cfg.base_url.trim_end_matches('/').to_string();
        let is_openrouter = base_url.contains("openrouter.ai");

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url,
            api_key,
            default_model,
            max_tokens: cfg.max_tokens,
            client,
            is_openrouter,
        })
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if self.is_openrouter {
            builder = builder
                .header("HTTP-Referer", "https://github.com/colloquy/colloquy")
                .header("X-Title", "colloquy");
        }
        builder
    }

    fn build_chat_body(&self, req: &ChatRequest) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();
        let model = req
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": true,
            "max_tokens": req.max_tokens.unwrap_or(self.max_tokens),
            "stream_options": { "include_usage": true },
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn msg_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::Assistant => assistant_to_openai(msg),
        Role::Tool => serde_json::json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.as_deref().unwrap_or(""),
            "content": msg.content.as_deref().unwrap_or(""),
        }),
        _ => serde_json::json!({
            "role": role_to_str(msg.role),
            "content": msg.content.as_deref().unwrap_or(""),
        }),
    }
}

fn assistant_to_openai(msg: &Message) -> Value {
    let mut obj = serde_json::json!({
        "role": "assistant",
        "content": msg.content.clone(),
    });
    if let Some(tool_calls) = &msg.tool_calls {
        let calls: Vec<Value> = tool_calls
            .iter()
            .map(|tc| {
                serde_json::json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": tc.arguments,
                    }
                })
            })
            .collect();
        if !calls.is_empty() {
            obj["tool_calls"] = Value::Array(calls);
        }
    }
    obj
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE streaming helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Carry-over between data lines: usage and finish reason arrive in
/// chunks before the `[DONE]` sentinel that actually ends the stream.
#[derive(Default)]
struct StreamState {
    usage: Option<Usage>,
    finish_reason: Option<String>,
}

fn parse_openai_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

/// Parse a single OpenAI SSE data payload into zero or more events.
fn parse_openai_sse(data: &str, state: &mut StreamState) -> Vec<Result<StreamEvent>> {
    if data.trim() == "[DONE]" {
        return vec![Ok(StreamEvent::Done {
            usage: state.usage.take(),
            finish_reason: state.finish_reason.take().or_else(|| Some("stop".into())),
        })];
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    if let Some(usage) = v.get("usage").and_then(parse_openai_usage) {
        state.usage = Some(usage);
    }

    let Some(choice) = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
    else {
        // Usage-only chunk (stream_options.include_usage).
        return Vec::new();
    };

    if let Some(fr) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        state.finish_reason = Some(fr.to_string());
    }

    let delta = choice.get("delta").unwrap_or(&Value::Null);
    let mut events = Vec::new();

    if let Some(tc_arr) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        for tc in tc_arr {
            let slot = tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0);

            // The first chunk for a call carries id + name; later chunks
            // carry argument fragments.  One chunk may carry both.
            if let Some(id) = tc.get("id").and_then(|v| v.as_str()) {
                let name = tc
                    .get("function")
                    .and_then(|f| f.get("name"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                events.push(Ok(StreamEvent::ToolCallStarted {
                    slot,
                    call_id: id.to_string(),
                    tool_name: name.to_string(),
                }));
            }

            if let Some(args) = tc
                .get("function")
                .and_then(|f| f.get("arguments"))
                .and_then(|v| v.as_str())
            {
                if !args.is_empty() {
                    events.push(Ok(StreamEvent::ToolCallDelta {
                        slot,
                        partial: args.to_string(),
                    }));
                }
            }
        }
    }

    // Reasoning trace (DeepSeek-style endpoints).
    if let Some(text) = delta.get("reasoning_content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            events.push(Ok(StreamEvent::Thinking {
                text: text.to_string(),
            }));
        }
    }

    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            events.push(Ok(StreamEvent::Token {
                text: text.to_string(),
            }));
        }
    }

    events
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(req);

        tracing::debug!(provider = %self.id, url = %url, "openai_compat stream request");

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
            parse_openai_sse(data, &mut state)
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

    #[test]
    fn tool_role_message_carries_call_id() {
        let msg = Message::tool_result("t1", "5");
        let v = msg_to_openai(&msg);
        assert_eq!(v["role"], "tool");
        assert_eq!(v["tool_call_id"], "t1");
        assert_eq!(v["content"], "5");
    }

    #[test]
    fn assistant_tool_calls_use_function_wrapper() {
        let msg = Message::assistant_with_tools(
            None,
            vec![ToolCall {
                id: "t1".into(),
                name: "add".into(),
                arguments: r#"{"a":2,"b":3}"#.into(),
            }],
        );
        let v = msg_to_openai(&msg);
        assert!(v["content"].is_null());
        assert_eq!(v["tool_calls"][0]["type"], "function");
        assert_eq!(v["tool_calls"][0]["function"]["name"], "add");
        // Arguments stay an opaque JSON string.
        assert_eq!(v["tool_calls"][0]["function"]["arguments"], r#"{"a":2,"b":3}"#);
    }

    #[test]
    fn content_delta_becomes_token() {
        let mut state = StreamState::default();
        let events = parse_openai_sse(
            r#"{"choices":[{"delta":{"content":"pong"}}]}"#,
            &mut state,
        );
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].as_ref().unwrap(),
            StreamEvent::Token { text } if text == "pong"
        ));
    }

    #[test]
    fn tool_call_chunks_are_slot_keyed() {
        let mut state = StreamState::default();

        let first = parse_openai_sse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"t1","function":{"name":"add","arguments":"{\"a\""}}]}}]}"#,
            &mut state,
        );
        assert_eq!(first.len(), 2);
        assert!(matches!(
            first[0].as_ref().unwrap(),
            StreamEvent::ToolCallStarted { slot: 0, call_id, tool_name }
                if call_id == "t1" && tool_name == "add"
        ));
        assert!(matches!(
            first[1].as_ref().unwrap(),
            StreamEvent::ToolCallDelta { slot: 0, partial } if partial == "{\"a\""
        ));

        let second = parse_openai_sse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":":2}"}}]}}]}"#,
            &mut state,
        );
        assert!(matches!(
            second[0].as_ref().unwrap(),
            StreamEvent::ToolCallDelta { slot: 0, partial } if partial == ":2}"
        ));
    }

    #[test]
    fn done_sentinel_carries_stashed_usage_and_reason() {
        let mut state = StreamState::default();
        parse_openai_sse(
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            &mut state,
        );
        parse_openai_sse(
            r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
            &mut state,
        );

        let events = parse_openai_sse("[DONE]", &mut state);
        assert_eq!(events.len(), 1);
        match events[0].as_ref().unwrap() {
            StreamEvent::Done {
                usage,
                finish_reason,
            } => {
                assert_eq!(usage.as_ref().unwrap().total_tokens, 15);
                assert_eq!(finish_reason.as_deref(), Some("tool_calls"));
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_an_error_not_a_panic() {
        let mut state = StreamState::default();
        let events = parse_openai_sse("{not json", &mut state);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(Error::Json(_))));
    }

    #[test]
    fn reasoning_content_becomes_thinking() {
        let mut state = StreamState::default();
        let events = parse_openai_sse(
            r#"{"choices":[{"delta":{"reasoning_content":"hmm"}}]}"#,
            &mut state,
        );
        assert!(matches!(
            events[0].as_ref().unwrap(),
            StreamEvent::Thinking { text } if text == "hmm"
        ));
    }
}
