use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Number, Value, map::Entry};
use tokio::sync::RwLock;
use tracing::debug;

use super::KvStorage;
use super::io::{ensure_parent_dir, load_or_default, write_json_file};

#[derive(Clone, Debug)]
pub struct JsonKvStorageConfig {
    pub working_dir: PathBuf,
    pub namespace: String,
    pub workspace: Option<String>,
}

/// A namespaced key/value store held in memory and flushed to
/// `kv_store_<namespace>.json` on demand.
pub struct JsonKvStorage {
    final_namespace: String,
    file_path: PathBuf,
    data: RwLock<HashMap<String, Value>>,
    dirty: AtomicBool,
}

impl JsonKvStorage {
    pub fn new(config: JsonKvStorageConfig) -> Self {
        let JsonKvStorageConfig {
            working_dir,
            namespace,
            workspace,
        } = config;

        let (workspace_prefix, workspace_dir) = match workspace.as_deref() {
            Some(ws) if !ws.is_empty() => (ws.to_string(), working_dir.join(ws)),
            _ => ("_".to_string(), working_dir),
        };

        Self {
            final_namespace: format!("{workspace_prefix}_{namespace}"),
            file_path: workspace_dir.join(format!("kv_store_{namespace}.json")),
            data: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn namespace(&self) -> &str {
        &self.final_namespace
    }

    /// Objects keep their shape; scalars are wrapped under `value`.
    /// `create_time` survives re-upserts, `update_time` always moves.
    fn decorate_upsert_record(previous: Option<&Value>, value: Value) -> Value {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                map
            }
        };

        let now = Value::Number(Number::from(Utc::now().timestamp()));
        let created = previous
            .and_then(|prev| prev.get("create_time"))
            .cloned()
            .unwrap_or_else(|| now.clone());

        match map.entry("create_time".to_string()) {
            Entry::Occupied(_) => {}
            Entry::Vacant(entry) => {
                entry.insert(created);
            }
        }
        map.insert("update_time".to_string(), now);

        Value::Object(map)
    }
}

#[async_trait]
impl KvStorage for JsonKvStorage {
    async fn initialize(&self) -> Result<()> {
        ensure_parent_dir(&self.file_path).await?;
        let data: HashMap<String, Value> = load_or_default(&self.file_path)
            .await
            .with_context(|| format!("failed to load kv store {}", self.final_namespace))?;
        debug!(namespace = %self.final_namespace, records = data.len(), "kv store loaded");
        *self.data.write().await = data;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn upsert(&self, records: HashMap<String, Value>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut guard = self.data.write().await;
        for (key, value) in records {
            let decorated = Self::decorate_upsert_record(guard.get(&key), value);
            guard.insert(key, decorated);
        }
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn get_all(&self) -> Result<HashMap<String, Value>> {
        Ok(self.data.read().await.clone())
    }

    async fn sync_if_dirty(&self) -> Result<()> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let snapshot = self.data.read().await.clone();

        write_json_file(&self.file_path, &snapshot)
            .await
            .with_context(|| format!("failed to write kv store {}", self.final_namespace))?;
        Ok(())
    }
}
