mod agents;
mod llm;
mod observability;
mod sessions;
mod tools;

pub use agents::*;
pub use llm::*;
pub use observability::*;
pub use sessions::*;
pub use tools::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agents: AgentDefaults,
    /// Registered LLM providers (data-driven: adding a provider = adding config).
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

/// One finding from [`Config::validate`].
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration.  Errors here abort startup; nothing
    /// in the core re-validates at runtime.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.agents.model.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "agents.model".into(),
                message: "a default model is required (e.g. \"openrouter/anthropic/claude-sonnet-4\")".into(),
            });
        }

        if self.providers.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "providers".into(),
                message: "no providers configured; LLM calls will fail".into(),
            });
        }

        for pc in &self.providers {
            if pc.base_url.is_empty() {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("providers.{}.base_url", pc.id),
                    message: "base_url must not be empty".into(),
                });
            }
        }

        if self.agents.max_chat_history == 0 && self.agents.load_chat_history {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "agents.max_chat_history".into(),
                message: "history loading enabled with a zero cap".into(),
            });
        }

        issues
    }

    /// Look up a provider config by id.
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }
}
