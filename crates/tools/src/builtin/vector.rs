//! Vector upsert and search over the wired embedding service and store.
//!
//! Both tools short-circuit with an error string when `agents.disable_rag`
//! is set or the RAG services are not wired — the gate is checked at
//! execution time, not registration time.

use serde::Deserialize;

use cq_domain::message::ToolDefinition;

use crate::registry::{Tool, ToolContext};
use crate::vector::{EmbeddingService, VectorStore};

const RAG_DISABLED: &str = "Error: RAG is disabled by configuration";

fn rag_services(
    ctx: &ToolContext,
) -> std::result::Result<
    (
        std::sync::Arc<dyn EmbeddingService>,
        std::sync::Arc<dyn VectorStore>,
    ),
    String,
> {
    if ctx.config.agents.disable_rag {
        return Err(RAG_DISABLED.to_owned());
    }
    match (ctx.embedder.clone(), ctx.vectors.clone()) {
        (Some(embedder), Some(vectors)) => Ok((embedder, vectors)),
        _ => Err("Error: no embedding service or vector store is configured".to_owned()),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// vector_upsert
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct UpsertArgs {
    id: String,
    text: String,
}

#[derive(Debug, Default)]
pub struct VectorUpsertTool;

#[async_trait::async_trait]
impl Tool for VectorUpsertTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "vector_upsert".into(),
            description: "Embed a text and store it under an id for later retrieval.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string" },
                    "text": { "type": "string" }
                },
                "required": ["id", "text"]
            }),
        }
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        arguments: &str,
    ) -> std::result::Result<String, String> {
        let (embedder, vectors) = rag_services(ctx)?;
        let args: UpsertArgs = serde_json::from_str(arguments)
            .map_err(|e| format!("Error: invalid arguments: {e}"))?;

        let embedding = embedder
            .embed(&args.text)
            .await
            .map_err(|e| format!("Error: embedding failed: {e}"))?;
        vectors
            .upsert(&args.id, &args.text, embedding)
            .await
            .map_err(|e| format!("Error: upsert failed: {e}"))?;

        Ok(format!("stored '{}'", args.id))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// vector_search
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default = "d_limit")]
    limit: usize,
}

fn d_limit() -> usize {
    5
}

#[derive(Debug, Default)]
pub struct VectorSearchTool;

#[async_trait::async_trait]
impl Tool for VectorSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "vector_search".into(),
            description: "Search previously stored texts by semantic similarity.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "limit": { "type": "integer", "default": 5 }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        arguments: &str,
    ) -> std::result::Result<String, String> {
        let (embedder, vectors) = rag_services(ctx)?;
        let args: SearchArgs = serde_json::from_str(arguments)
            .map_err(|e| format!("Error: invalid arguments: {e}"))?;

        let embedding = embedder
            .embed(&args.query)
            .await
            .map_err(|e| format!("Error: embedding failed: {e}"))?;
        let hits = vectors
            .search(embedding, args.limit)
            .await
            .map_err(|e| format!("Error: search failed: {e}"))?;

        if hits.is_empty() {
            return Ok("no matches".into());
        }
        Ok(hits
            .iter()
            .map(|h| format!("[{} {:.3}] {}", h.id, h.score, h.text))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::InMemoryVectorStore;
    use cq_domain::config::Config;
    use cq_domain::error::Result;
    use std::sync::Arc;

    /// Deterministic embedding: character-class histogram.  Enough for
    /// ranking assertions without a model.
    struct HashEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingService for HashEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0f32; 8];
            for (i, b) in text.bytes().enumerate() {
                v[i % 8] += (b as f32) / 255.0;
            }
            Ok(v)
        }
    }

    fn rag_ctx(disable_rag: bool) -> ToolContext {
        let mut config = Config::default();
        config.agents.disable_rag = disable_rag;
        ToolContext::new(Arc::new(config))
            .with_rag(Arc::new(HashEmbedder), Arc::new(InMemoryVectorStore::new()))
    }

    #[tokio::test]
    async fn disabled_rag_short_circuits() {
        let ctx = rag_ctx(true);
        let err = VectorUpsertTool
            .execute(&ctx, r#"{"id":"a","text":"hello"}"#)
            .await
            .unwrap_err();
        assert_eq!(err, RAG_DISABLED);

        let err = VectorSearchTool
            .execute(&ctx, r#"{"query":"hello"}"#)
            .await
            .unwrap_err();
        assert_eq!(err, RAG_DISABLED);
    }

    #[tokio::test]
    async fn unwired_services_error() {
        let ctx = ToolContext::new(Arc::new(Config::default()));
        let err = VectorSearchTool
            .execute(&ctx, r#"{"query":"q"}"#)
            .await
            .unwrap_err();
        assert!(err.contains("no embedding service"));
    }

    #[tokio::test]
    async fn upsert_then_search_finds_the_text() {
        let ctx = rag_ctx(false);
        VectorUpsertTool
            .execute(&ctx, r#"{"id":"n1","text":"the capital of france is paris"}"#)
            .await
            .unwrap();

        let out = VectorSearchTool
            .execute(&ctx, r#"{"query":"the capital of france is paris","limit":1}"#)
            .await
            .unwrap();
        assert!(out.contains("n1"));
        assert!(out.contains("paris"));
    }
}
