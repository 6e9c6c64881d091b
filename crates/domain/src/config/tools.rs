use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-tool settings.  Beyond the reserved keys, every sub-table is a
/// tool's own settings, e.g. `tools.web_search.api_key`; tools read
/// their table and unknown tables are preserved for external tool
/// crates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsConfig {
    /// Root directory the read-file tool is confined to.  Defaults to
    /// the process working directory.
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,

    /// Free-form per-tool tables, keyed by tool name.
    #[serde(flatten)]
    pub settings: HashMap<String, serde_json::Value>,
}

impl ToolsConfig {
    /// Look up one setting for one tool, e.g. `setting("web_search", "api_key")`.
    pub fn setting(&self, tool: &str, key: &str) -> Option<&serde_json::Value> {
        self.settings.get(tool)?.get(key)
    }
}
