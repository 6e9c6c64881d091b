//! Workspace-confined file reading with a capability guard.

use std::path::PathBuf;

use serde::Deserialize;

use cq_domain::message::ToolDefinition;

use crate::guard::guard_path;
use crate::registry::{Tool, ToolContext};

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    path: String,
    /// Line to start from (0-indexed).
    #[serde(default)]
    offset: Option<usize>,
    /// Maximum number of lines to return.
    #[serde(default)]
    limit: Option<usize>,
}

/// Reads a file relative to the configured workspace root, after the
/// capability guard clears the path.
#[derive(Debug, Default)]
pub struct ReadFileTool;

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".into(),
            description: "Read a text file from the workspace. Sensitive paths \
                          (env files, key material, .ssh/.aws/.kube) are denied."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path, relative to the workspace root" },
                    "offset": { "type": "integer", "description": "First line to return (0-indexed)" },
                    "limit": { "type": "integer", "description": "Maximum number of lines" }
                },
                "required": ["path"]
            }),
        }
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        arguments: &str,
    ) -> std::result::Result<String, String> {
        let args: ReadFileArgs = serde_json::from_str(arguments)
            .map_err(|e| format!("Error: invalid arguments: {e}"))?;

        guard_path(&args.path)?;

        let root = ctx
            .config
            .tools
            .workspace_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let full = root.join(&args.path);

        let raw = tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| format!("Error: reading '{}': {e}", args.path))?;

        let offset = args.offset.unwrap_or(0);
        let text: String = match args.limit {
            Some(limit) => raw
                .lines()
                .skip(offset)
                .take(limit)
                .collect::<Vec<_>>()
                .join("\n"),
            None if offset > 0 => raw.lines().skip(offset).collect::<Vec<_>>().join("\n"),
            None => raw,
        };
        Ok(text)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
