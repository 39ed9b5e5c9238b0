use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod local;
pub mod neo4j;

pub use local::LocalGraphStore;
pub use neo4j::Neo4jGraphStore;

/// A named concept. `name` is the unique key across the store.
#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityNode {
    pub name: String,
    #[serde(rename = "type", default)]
    pub entity_type: Option<String>,
}

impl EntityNode {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: Some(entity_type.into()),
        }
    }
}

/// Directed, typed edge. `(source, target, relationship)` is unique: upserting
/// the same triple twice leaves one edge.
#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEdge {
    pub source: String,
    pub target: String,
    pub relationship: String,
}

impl RelationEdge {
    pub fn new(
        source: impl Into<String>,
        relationship: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relationship: relationship.into(),
        }
    }

    pub fn triple(&self) -> Triple {
        Triple {
            source: self.source.clone(),
            relationship: self.relationship.clone(),
            target: self.target.clone(),
        }
    }
}

/// Query-time rendering of an edge; never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    pub source: String,
    pub relationship: String,
    pub target: String,
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} --[{}]--> {}",
            self.source, self.relationship, self.target
        )
    }
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Idempotent: installs the uniqueness constraint on entity names.
    async fn ensure_schema(&self) -> Result<()>;

    /// Edges where either endpoint's name contains `needle` (case-sensitive),
    /// at most `limit` of them.
    async fn relations_matching(&self, needle: &str, limit: usize) -> Result<Vec<Triple>>;
}

/// Write side used by seeding tools. Both upserts are idempotent.
#[async_trait]
pub trait GraphWriter: Send + Sync {
    async fn upsert_entity(&self, entity: &EntityNode) -> Result<()>;

    async fn upsert_relation(&self, edge: &RelationEdge) -> Result<()>;

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Pre-extracted graph data, `{ "nodes": [..], "edges": [..] }`.
#[derive(Default, Clone, Debug, Deserialize)]
pub struct GraphFixture {
    #[serde(default)]
    pub nodes: Vec<EntityNode>,
    #[serde(default)]
    pub edges: Vec<RelationEdge>,
}

impl GraphFixture {
    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Nodes first so typed entities exist before edges create bare endpoints.
    pub async fn apply(&self, writer: &dyn GraphWriter) -> Result<()> {
        for node in &self.nodes {
            writer.upsert_entity(node).await?;
        }
        for edge in &self.edges {
            writer.upsert_relation(edge).await?;
        }
        writer.flush().await
    }
}
