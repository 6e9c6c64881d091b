use cq_domain::error::Result;
use cq_domain::message::{Message, ToolDefinition};
use cq_domain::stream::{BoxStream, StreamEvent};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic streaming chat request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// The conversation messages to send.
    pub messages: Vec<Message>,
    /// Tool definitions the model may invoke; schemas pass through
    /// verbatim.
    pub tools: Vec<ToolDefinition>,
    /// Model identifier override.  When `None`, the provider uses its
    /// configured default.
    pub model: Option<String>,
    /// Cap on generated tokens.  When `None`, the provider's configured
    /// cap applies.
    pub max_tokens: Option<u32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every wire-family adapter implements.
///
/// Adapters serialize the conversation into their family's JSON body,
/// open a streaming POST, and return the parsed event stream.  Callers
/// aggregate with [`crate::collect_stream`].
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Open a streaming chat completion.
    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    /// This adapter's config id (e.g. `"openrouter"`).
    fn provider_id(&self) -> &str;

    /// Model used when the request carries no override.
    fn default_model(&self) -> &str;
}

impl std::fmt::Debug for dyn LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmProvider")
            .field("provider_id", &self.provider_id())
            .finish()
    }
}
