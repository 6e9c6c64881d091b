use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent defaults
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Defaults applied to every agent the runtime constructs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaults {
    /// LLM identifier passed to the provider, `"provider_id/model_name"`.
    #[serde(default)]
    pub model: String,

    /// Cap on messages loaded from session storage at agent init.
    #[serde(default = "d_10")]
    pub max_chat_history: usize,

    /// Whether prior session messages are loaded at agent init.
    #[serde(default = "d_true")]
    pub load_chat_history: bool,

    /// Gates execution of the vector tools.  When set, vector upsert
    /// and search short-circuit with an error string.
    #[serde(default)]
    pub disable_rag: bool,

    /// Model used by the embedding service, when one is wired.
    #[serde(default)]
    pub embedding_model: Option<String>,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_chat_history: 10,
            load_chat_history: true,
            disable_rag: false,
            embedding_model: None,
        }
    }
}

impl AgentDefaults {
    /// Split `"provider_id/model_name"` into its two halves.  A bare
    /// model name maps to `(name, name)` so misconfiguration surfaces
    /// as an unknown-provider error rather than a silent default.
    pub fn provider_and_model(&self) -> (&str, &str) {
        match self.model.split_once('/') {
            Some((provider, model)) => (provider, model),
            None => (self.model.as_str(), self.model.as_str()),
        }
    }
}

fn d_10() -> usize {
    10
}

fn d_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let d = AgentDefaults::default();
        assert_eq!(d.max_chat_history, 10);
        assert!(d.load_chat_history);
        assert!(!d.disable_rag);
        assert!(d.embedding_model.is_none());
    }

    #[test]
    fn provider_and_model_split() {
        let mut d = AgentDefaults::default();
        d.model = "openrouter/anthropic/claude-sonnet-4".into();
        let (provider, model) = d.provider_and_model();
        assert_eq!(provider, "openrouter");
        assert_eq!(model, "anthropic/claude-sonnet-4");
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let d: AgentDefaults = toml::from_str("").unwrap();
        assert_eq!(d.max_chat_history, 10);
        assert!(d.load_chat_history);
    }
}
