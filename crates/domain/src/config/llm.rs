use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One configured LLM endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Referenced by `agents.model` as the segment before the first `/`.
    pub id: String,
    /// Wire family this endpoint speaks.
    pub kind: ProviderKind,
    pub base_url: String,
    /// Plaintext API key.  Prefer `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable to read the key from when `api_key` is unset.
    /// When both are unset, a per-family default variable is consulted.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
    /// Request cap on generated tokens.
    #[serde(default = "d_max_tokens")]
    pub max_tokens: u32,
}

/// Wire families.  Dispatch is by family, not per-model: gateways that
/// speak a family's format (Minimax, Groq, OpenRouter) reuse its adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI chat-completions contract (OpenRouter, Groq, compatibility
    /// gateways).
    OpenaiCompat,
    /// Anthropic messages contract (native Claude, Anthropic gateways).
    Anthropic,
}

impl ProviderKind {
    /// Default environment variable consulted when no key is configured.
    pub fn default_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenaiCompat => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

fn d_max_tokens() -> u32 {
    4096
}
