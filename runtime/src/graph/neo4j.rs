use std::env;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use neo4rs::{Graph, query};
use tracing::{debug, info};

use super::{EntityNode, GraphStore, GraphWriter, RelationEdge, Triple};

const MATCH_RELATIONS: &str = "MATCH (a:Entity)-[r:RELATED]->(b:Entity)
     WHERE a.name CONTAINS $entity OR b.name CONTAINS $entity
     RETURN a.name AS source, r.type AS relationship, b.name AS target
     LIMIT $limit";

/// Graph store reached over bolt. Nodes are `(:Entity {name, type})`, edges
/// are `[:RELATED {type}]`.
pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .with_context(|| format!("failed to connect to Neo4j at {uri}"))?;
        info!(%uri, "connected to Neo4j");
        Ok(Self { graph })
    }

    /// Reads `NEO4J_URI`, `NEO4J_USERNAME` and `NEO4J_PASSWORD`.
    pub async fn from_env() -> Result<Self> {
        let uri = env::var("NEO4J_URI").unwrap_or_else(|_| "bolt://localhost:7687".to_string());
        let user = env::var("NEO4J_USERNAME").unwrap_or_else(|_| "neo4j".to_string());
        let password =
            env::var("NEO4J_PASSWORD").map_err(|_| anyhow!("NEO4J_PASSWORD not set"))?;

        Self::connect(&uri, &user, &password).await
    }

    pub async fn upsert_entity(&self, entity: &EntityNode) -> Result<()> {
        let q = query(
            "MERGE (n:Entity {name: $name})
             SET n.type = coalesce($type, n.type)",
        )
        .param("name", entity.name.clone())
        .param("type", entity.entity_type.clone());

        self.graph.run(q).await.context("failed to upsert entity")?;
        debug!(name = %entity.name, "upserted entity");
        Ok(())
    }

    pub async fn upsert_relation(&self, edge: &RelationEdge) -> Result<()> {
        let q = query(
            "MERGE (a:Entity {name: $source})
             MERGE (b:Entity {name: $target})
             MERGE (a)-[:RELATED {type: $type}]->(b)",
        )
        .param("source", edge.source.clone())
        .param("target", edge.target.clone())
        .param("type", edge.relationship.clone());

        self.graph.run(q).await.context("failed to upsert relation")?;
        debug!(triple = %edge.triple(), "upserted relation");
        Ok(())
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn ensure_schema(&self) -> Result<()> {
        // the constraint is backed by a range index on name, so no separate index
        self.graph
            .run(query(
                "CREATE CONSTRAINT entity_name IF NOT EXISTS FOR (n:Entity) REQUIRE n.name IS UNIQUE",
            ))
            .await
            .context("failed to create Entity.name constraint")?;
        info!("Neo4j schema ready");
        Ok(())
    }

    async fn relations_matching(&self, needle: &str, limit: usize) -> Result<Vec<Triple>> {
        let q = query(MATCH_RELATIONS)
            .param("entity", needle)
            .param("limit", limit as i64);

        let mut rows = self
            .graph
            .execute(q)
            .await
            .with_context(|| format!("graph query failed for '{needle}'"))?;

        let mut triples = Vec::new();
        while let Some(row) = rows.next().await? {
            let source: String = row.get("source").context("row missing source")?;
            let relationship: String = row.get("relationship").unwrap_or_default();
            let target: String = row.get("target").context("row missing target")?;
            triples.push(Triple {
                source,
                relationship,
                target,
            });
        }

        Ok(triples)
    }
}

#[async_trait]
impl GraphWriter for Neo4jGraphStore {
    async fn upsert_entity(&self, entity: &EntityNode) -> Result<()> {
        Neo4jGraphStore::upsert_entity(self, entity).await
    }

    async fn upsert_relation(&self, edge: &RelationEdge) -> Result<()> {
        Neo4jGraphStore::upsert_relation(self, edge).await
    }
}
