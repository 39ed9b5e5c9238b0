use std::{collections::BTreeMap, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::ai::EmbeddingProvider;

/// One nearest-neighbour hit. Lower `distance` is closer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, Value>,
    pub distance: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// At most `k` hits, closest first.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;
}

#[derive(Clone)]
pub struct VectorRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl VectorRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub async fn try_search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let embedding = self
            .embedder
            .embed_query(query)
            .await
            .context("failed to embed query")?;
        let mut hits = self
            .index
            .query(&embedding, k)
            .await
            .context("vector index query failed")?;
        hits.truncate(k);
        Ok(hits)
    }

    /// Chunk texts in the index's ranking. Any embedding or index failure
    /// yields an empty list so the rest of the answer can still be built.
    pub async fn search(&self, query: &str, k: usize) -> Vec<String> {
        match self.try_search(query, k).await {
            Ok(hits) => {
                debug!(hits = hits.len(), k, "vector search complete");
                hits.into_iter().map(|hit| hit.text).collect()
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "vector search failed");
                Vec::new()
            }
        }
    }
}
