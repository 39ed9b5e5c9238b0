use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

pub mod io;
pub mod json_kv;

pub use io::*;
pub use json_kv::{JsonKvStorage, JsonKvStorageConfig};

pub type StorageResult<T> = Result<T>;

#[async_trait]
pub trait KvStorage: Send + Sync {
    /// Loads the backing file, or starts empty when it does not exist yet.
    async fn initialize(&self) -> StorageResult<()>;

    async fn upsert(&self, records: HashMap<String, serde_json::Value>) -> StorageResult<()>;

    async fn get_all(&self) -> StorageResult<HashMap<String, serde_json::Value>>;

    /// Flush to disk only when something changed since the last flush.
    async fn sync_if_dirty(&self) -> StorageResult<()>;
}
