use std::{collections::BTreeSet, sync::Arc};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::extractor::EntityExtractor;
use crate::graph::GraphStore;

pub const DEFAULT_PER_ENTITY_LIMIT: usize = 5;

/// Turns a question into knowledge-graph triples: extract entity hints, look
/// each one up by substring, render and deduplicate. Store failures degrade
/// per entity; extraction failures do not.
#[derive(Clone)]
pub struct GraphRetriever {
    extractor: EntityExtractor,
    store: Arc<dyn GraphStore>,
    per_entity_limit: usize,
}

impl GraphRetriever {
    pub fn new(
        extractor: EntityExtractor,
        store: Arc<dyn GraphStore>,
        per_entity_limit: usize,
    ) -> Self {
        Self {
            extractor,
            store,
            per_entity_limit,
        }
    }

    /// Entity hints for `query`, then their triples. A failed extraction call
    /// is an error; an extraction that names nothing is an empty set.
    pub async fn search(&self, query: &str) -> Result<BTreeSet<String>> {
        let entities = self.extract_entities(query).await?;
        Ok(self.search_entities(&entities).await)
    }

    pub async fn extract_entities(&self, query: &str) -> Result<BTreeSet<String>> {
        self.extractor
            .extract(query)
            .await
            .context("entity extraction failed")
    }

    /// One store query per entity. A failing lookup is logged and skipped;
    /// the remaining entities are still queried.
    pub async fn search_entities(&self, entities: &BTreeSet<String>) -> BTreeSet<String> {
        let mut triples = BTreeSet::new();
        for entity in entities {
            match self
                .store
                .relations_matching(entity, self.per_entity_limit)
                .await
            {
                Ok(found) => {
                    debug!(entity = %entity, matches = found.len(), "graph lookup");
                    triples.extend(found.iter().map(ToString::to_string));
                }
                Err(err) => {
                    warn!(entity = %entity, error = %format!("{err:#}"), "graph search failed");
                }
            }
        }
        triples
    }
}
