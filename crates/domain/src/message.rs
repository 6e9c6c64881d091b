//! The conversation message model.
//!
//! `Message` is both the in-memory representation and the persisted
//! session format: a session file is the serde form of `Vec<Message>`.
//! Tool-call arguments are kept as an opaque JSON string and only
//! validated when a tool is actually dispatched.

use serde::{Deserialize, Serialize};

/// A structured request from the model to invoke a named tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned id, unique within one assistant message.
    pub id: String,
    pub name: String,
    /// Raw JSON argument payload, exactly as the provider produced it.
    pub arguments: String,
}

/// Tool definition exposed to the LLM.  The parameter schema is passed
/// through to providers verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the conversation (provider-agnostic).
///
/// Shape invariants:
/// - tool-role messages carry `tool_call_id` and `content`
/// - assistant messages carry `content`, `tool_calls`, or both
/// - system and user messages carry `content` only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

// ── Convenience constructors ───────────────────────────────────────

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(text.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(text.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(text.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Assistant turn carrying tool invocations, with optional leading text.
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_call_id: None,
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
        }
    }

    /// Tool-result message answering one prior tool call.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|tc| !tc.is_empty())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The ordered, owned sequence of messages representing the conversation
/// so far.  Append-only during a single agent run; never shared across
/// threads — all mutation goes through the owning agent.
#[derive(Debug, Default, Clone)]
pub struct Context {
    messages: Vec<Message>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a message and append it.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Prepend a system prompt unless one is already present at index 0.
    /// Idempotent: calling it twice leaves the context unchanged.
    pub fn ensure_system_prompt(&mut self, prompt: &str) {
        let has_system = self
            .messages
            .first()
            .map(|m| m.role == Role::System)
            .unwrap_or(false);
        if !has_system {
            self.messages.insert(0, Message::system(prompt));
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages excluding any system prompt.
    pub fn non_system_len(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role != Role::System)
            .count()
    }

    /// Last assistant message, if any.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// Last user message, if any.
    pub fn last_user(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }
}

impl From<Vec<Message>> for Context {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_system_prompt_prepends_once() {
        let mut ctx = Context::new();
        ctx.push(Message::user("hi"));
        ctx.ensure_system_prompt("be helpful");

        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.messages()[0].role, Role::System);
        assert_eq!(ctx.messages()[0].content.as_deref(), Some("be helpful"));
    }

    #[test]
    fn ensure_system_prompt_is_idempotent() {
        let mut ctx = Context::new();
        ctx.push(Message::user("hi"));
        ctx.ensure_system_prompt("be helpful");
        let snapshot = ctx.messages().to_vec();

        ctx.ensure_system_prompt("be helpful");
        assert_eq!(ctx.messages(), &snapshot[..]);
    }

    #[test]
    fn ensure_system_prompt_on_empty_context() {
        let mut ctx = Context::new();
        ctx.ensure_system_prompt("sys");
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.messages()[0].role, Role::System);
    }

    #[test]
    fn non_system_len_excludes_system() {
        let mut ctx = Context::new();
        ctx.ensure_system_prompt("sys");
        ctx.push(Message::user("a"));
        ctx.push(Message::assistant("b"));
        assert_eq!(ctx.non_system_len(), 2);
    }

    #[test]
    fn tool_result_carries_id_and_content() {
        let msg = Message::tool_result("call_1", "42");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.content.as_deref(), Some("42"));
    }

    #[test]
    fn assistant_with_empty_tool_calls_has_none() {
        let msg = Message::assistant_with_tools(Some("text".into()), vec![]);
        assert!(msg.tool_calls.is_none());
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn persisted_form_round_trips() {
        let messages = vec![
            Message::system("sys"),
            Message::user("2+3?"),
            Message::assistant_with_tools(
                None,
                vec![ToolCall {
                    id: "t1".into(),
                    name: "add".into(),
                    arguments: r#"{"a":2,"b":3}"#.into(),
                }],
            ),
            Message::tool_result("t1", "5"),
            Message::assistant("result 5"),
        ];

        let json = serde_json::to_string(&messages).unwrap();
        let parsed: Vec<Message> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, messages);

        // Optional fields are omitted, not null.
        assert!(!json.contains("\"tool_call_id\":null"));
        assert!(!json.contains("\"tool_calls\":null"));
    }
}
