//! Hybrid retrieval: dense search over text chunks plus entity lookups in the
//! knowledge graph, merged into one context block.
//!
//! The two stores fail independently. An outage in one degrades that section
//! to empty and leaves the other untouched. A failed entity-extraction call is
//! a language-model failure and aborts the whole question.

use anyhow::Result;

pub mod extractor;
pub mod fuse;
pub mod graph;
pub mod lance;
pub mod vector;

pub use extractor::{EntityExtractor, parse_entity_list};
pub use fuse::{QueryContext, fuse};
pub use graph::{DEFAULT_PER_ENTITY_LIMIT, GraphRetriever};
pub use lance::LanceVectorIndex;
pub use vector::{ScoredChunk, VectorIndex, VectorRetriever};

pub const DEFAULT_TOP_K: usize = 3;

#[derive(Clone)]
pub struct HybridRetriever {
    vector: VectorRetriever,
    graph: GraphRetriever,
    top_k: usize,
}

impl HybridRetriever {
    pub fn new(vector: VectorRetriever, graph: GraphRetriever, top_k: usize) -> Self {
        Self {
            vector,
            graph,
            top_k: top_k.max(1),
        }
    }

    /// Entity extraction and vector search are independent, so they run
    /// concurrently; the graph lookups wait on extraction only.
    pub async fn retrieve(&self, query: &str) -> Result<QueryContext> {
        let (entities, chunks) = tokio::join!(
            self.graph.extract_entities(query),
            self.vector.search(query, self.top_k)
        );
        let triples = self.graph.search_entities(&entities?).await;

        Ok(QueryContext { chunks, triples })
    }
}
