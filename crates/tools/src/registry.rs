//! Tool trait, invocation context, and the name → tool registry.

use std::collections::HashMap;
use std::sync::Arc;

use cq_domain::config::Config;
use cq_domain::message::ToolDefinition;

use crate::vector::{EmbeddingService, VectorStore};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool trait + context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything a tool may touch during one invocation.  Built per
/// dispatch; tools must not retain it.
#[derive(Clone)]
pub struct ToolContext {
    pub config: Arc<Config>,
    /// Embedding service, when one is wired (RAG enabled).
    pub embedder: Option<Arc<dyn EmbeddingService>>,
    /// Vector store, when one is wired (RAG enabled).
    pub vectors: Option<Arc<dyn VectorStore>>,
}

impl ToolContext {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            embedder: None,
            vectors: None,
        }
    }

    pub fn with_rag(
        mut self,
        embedder: Arc<dyn EmbeddingService>,
        vectors: Arc<dyn VectorStore>,
    ) -> Self {
        self.embedder = Some(embedder);
        self.vectors = Some(vectors);
        self
    }
}

/// A named, schema-described callable the model may invoke.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Execute with a raw JSON argument string.  Argument validation is
    /// the tool's job; malformed arguments become an `Err` string, never
    /// a panic or a raised error.
    async fn execute(
        &self,
        ctx: &ToolContext,
        arguments: &str,
    ) -> std::result::Result<String, String>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Name → tool map.  Registration happens during agent construction;
/// the registry is read-only while a run is in flight.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name.  Re-registering a name
    /// replaces the prior entry (last writer wins).
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Definitions for the provider request, sorted by name so request
    /// bodies are deterministic.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
