use std::{collections::HashMap, path::PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::{EntityNode, GraphStore, GraphWriter, RelationEdge, Triple};
use crate::storage::{JsonKvStorage, JsonKvStorageConfig, KvStorage};

#[derive(Default)]
struct EntityGraph {
    graph: StableDiGraph<EntityNode, RelationEdge>,
    by_name: HashMap<String, NodeIndex>,
}

impl EntityGraph {
    /// Returns the node for `name`, creating a bare one if needed.
    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.by_name.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(EntityNode {
            name: name.to_string(),
            entity_type: None,
        });
        self.by_name.insert(name.to_string(), idx);
        idx
    }

    fn upsert_entity(&mut self, entity: EntityNode) {
        let idx = self.node(&entity.name);
        if entity.entity_type.is_some() {
            self.graph[idx].entity_type = entity.entity_type;
        }
    }

    /// `false` when an identical edge already exists.
    fn upsert_relation(&mut self, edge: RelationEdge) -> bool {
        let a = self.node(&edge.source);
        let b = self.node(&edge.target);
        let exists = self
            .graph
            .edges_connecting(a, b)
            .any(|e| e.weight().relationship == edge.relationship);
        if exists {
            return false;
        }
        self.graph.add_edge(a, b, edge);
        true
    }

    fn matching(&self, needle: &str, limit: usize) -> Vec<Triple> {
        self.graph
            .edge_indices()
            .filter_map(|e| {
                let (a, b) = self.graph.edge_endpoints(e)?;
                let hit = self.graph[a].name.contains(needle) || self.graph[b].name.contains(needle);
                hit.then(|| self.graph[e].triple())
            })
            .take(limit)
            .collect()
    }
}

struct Snapshot {
    entities: JsonKvStorage,
    relations: JsonKvStorage,
}

/// In-process graph store on petgraph, optionally backed by two JSON
/// namespaces (`entities`, `relations`) so it survives restarts.
pub struct LocalGraphStore {
    inner: RwLock<EntityGraph>,
    snapshot: Option<Snapshot>,
}

impl Default for LocalGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalGraphStore {
    /// Memory only; nothing is written to disk.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(EntityGraph::default()),
            snapshot: None,
        }
    }

    pub async fn open(working_dir: PathBuf, workspace: Option<String>) -> Result<Self> {
        let entities = JsonKvStorage::new(JsonKvStorageConfig {
            working_dir: working_dir.clone(),
            namespace: "entities".into(),
            workspace: workspace.clone(),
        });
        let relations = JsonKvStorage::new(JsonKvStorageConfig {
            working_dir,
            namespace: "relations".into(),
            workspace,
        });
        entities.initialize().await?;
        relations.initialize().await?;

        let mut graph = EntityGraph::default();
        for value in entities.get_all().await?.into_values() {
            let entity: EntityNode =
                serde_json::from_value(value).context("malformed entity record")?;
            graph.upsert_entity(entity);
        }

        for value in relations.get_all().await?.into_values() {
            let edge: RelationEdge =
                serde_json::from_value(value).context("malformed relation record")?;
            if !graph.by_name.contains_key(&edge.source) || !graph.by_name.contains_key(&edge.target)
            {
                warn!(triple = %edge.triple(), "relation references unknown entity, skipping");
                continue;
            }
            graph.upsert_relation(edge);
        }

        info!(
            nodes = graph.graph.node_count(),
            edges = graph.graph.edge_count(),
            namespace = entities.namespace(),
            path = %entities.file_path().display(),
            "local knowledge graph loaded"
        );

        Ok(Self {
            inner: RwLock::new(graph),
            snapshot: Some(Snapshot {
                entities,
                relations,
            }),
        })
    }

    pub async fn upsert_entity(&self, entity: EntityNode) -> Result<()> {
        if let Some(snapshot) = &self.snapshot {
            let merged = {
                let mut guard = self.inner.write().await;
                guard.upsert_entity(entity.clone());
                let idx = guard.by_name[&entity.name];
                guard.graph[idx].clone()
            };
            snapshot
                .entities
                .upsert(HashMap::from([(merged.name.clone(), to_value(&merged)?)]))
                .await?;
        } else {
            self.inner.write().await.upsert_entity(entity);
        }
        Ok(())
    }

    pub async fn upsert_relation(&self, edge: RelationEdge) -> Result<()> {
        let (inserted, endpoints) = {
            let mut guard = self.inner.write().await;
            let inserted = guard.upsert_relation(edge.clone());
            let endpoints = [&edge.source, &edge.target]
                .map(|name| guard.graph[guard.by_name[name]].clone());
            (inserted, endpoints)
        };

        if let (true, Some(snapshot)) = (inserted, &self.snapshot) {
            let mut nodes = HashMap::new();
            for node in endpoints {
                nodes.insert(node.name.clone(), to_value(&node)?);
            }
            snapshot.entities.upsert(nodes).await?;
            snapshot
                .relations
                .upsert(HashMap::from([(edge.triple().to_string(), to_value(&edge)?)]))
                .await?;
        }
        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        if let Some(snapshot) = &self.snapshot {
            snapshot.entities.sync_if_dirty().await?;
            snapshot.relations.sync_if_dirty().await?;
        }
        Ok(())
    }

    pub async fn node_count(&self) -> usize {
        self.inner.read().await.graph.node_count()
    }

    pub async fn edge_count(&self) -> usize {
        self.inner.read().await.graph.edge_count()
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("failed to serialize graph record")
}

#[async_trait]
impl GraphStore for LocalGraphStore {
    async fn ensure_schema(&self) -> Result<()> {
        // uniqueness of names is structural here: `by_name` holds one node per name
        Ok(())
    }

    async fn relations_matching(&self, needle: &str, limit: usize) -> Result<Vec<Triple>> {
        Ok(self.inner.read().await.matching(needle, limit))
    }
}

#[async_trait]
impl GraphWriter for LocalGraphStore {
    async fn upsert_entity(&self, entity: &EntityNode) -> Result<()> {
        LocalGraphStore::upsert_entity(self, entity.clone()).await
    }

    async fn upsert_relation(&self, edge: &RelationEdge) -> Result<()> {
        LocalGraphStore::upsert_relation(self, edge.clone()).await
    }

    async fn flush(&self) -> Result<()> {
        LocalGraphStore::flush(self).await
    }
}
