//! Embedding and vector-store seams.
//!
//! Real deployments plug a remote embedding model and a vector database
//! in behind these traits.  The in-memory store keeps the vector tools
//! exercisable without either.

use parking_lot::RwLock;

use cq_domain::error::Result;

/// Produces an embedding vector for a text.
#[async_trait::async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// One stored document with its embedding.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub text: String,
    pub score: f32,
}

/// Upsert-and-search vector storage.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, id: &str, text: &str, embedding: Vec<f32>) -> Result<()>;
    async fn search(&self, embedding: Vec<f32>, limit: usize) -> Result<Vec<VectorHit>>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    text: String,
    embedding: Vec<f32>,
}

/// Cosine-similarity store over a flat list.  Fine for tests and small
/// console sessions; anything larger belongs in a real vector database.
#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait::async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, id: &str, text: &str, embedding: Vec<f32>) -> Result<()> {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.iter_mut().find(|e| e.id == id) {
            existing.text = text.to_owned();
            existing.embedding = embedding;
        } else {
            entries.push(Entry {
                id: id.to_owned(),
                text: text.to_owned(),
                embedding,
            });
        }
        Ok(())
    }

    async fn search(&self, embedding: Vec<f32>, limit: usize) -> Result<Vec<VectorHit>> {
        let entries = self.entries.read();
        let mut hits: Vec<VectorHit> = entries
            .iter()
            .map(|e| VectorHit {
                id: e.id.clone(),
                text: e.text.clone(),
                score: cosine(&embedding, &e.embedding),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = InMemoryVectorStore::new();
        store.upsert("a", "old", vec![1.0, 0.0]).await.unwrap();
        store.upsert("a", "new", vec![0.0, 1.0]).await.unwrap();

        let hits = store.search(vec![0.0, 1.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "new");
    }

    #[tokio::test]
    async fn search_ranks_by_cosine() {
        let store = InMemoryVectorStore::new();
        store.upsert("x", "close", vec![1.0, 0.1]).await.unwrap();
        store.upsert("y", "far", vec![-1.0, 0.0]).await.unwrap();

        let hits = store.search(vec![1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].id, "x");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn cosine_handles_degenerate_input() {
        assert_eq!(cosine(&[], &[]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
