use std::collections::BTreeMap;

use anyhow::{Context, Result};
use arrow_array::{
    Array, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, RecordBatch,
    StringArray,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Table, connect,
    query::{ExecutableQuery, QueryBase},
};
use serde_json::{Value, json};
use tracing::info;

use super::vector::{ScoredChunk, VectorIndex};

const ID_COLUMN: &str = "id";
const DISTANCE_COLUMN: &str = "_distance";

/// Read-only view of a LanceDB table populated by the ingestion job.
///
/// Expected columns: `id` (utf8), the configured text column (utf8) and one
/// fixed-size float vector column. Any other scalar column is surfaced as
/// chunk metadata.
pub struct LanceVectorIndex {
    table: Table,
    text_column: String,
}

impl LanceVectorIndex {
    pub async fn open(uri: &str, table_name: &str, text_column: &str) -> Result<Self> {
        let db = connect(uri)
            .execute()
            .await
            .with_context(|| format!("failed to connect to LanceDB at {uri}"))?;
        let table = db
            .open_table(table_name)
            .execute()
            .await
            .with_context(|| format!("failed to open LanceDB table {table_name}"))?;
        info!(%uri, table = table_name, "vector index opened");
        Ok(Self {
            table,
            text_column: text_column.to_string(),
        })
    }
}

/// Rows in the order LanceDB returned them, capped at `k`. The index ranks;
/// nothing here reorders.
fn chunks_from_batches(
    batches: &[RecordBatch],
    text_column: &str,
    k: usize,
) -> Result<Vec<ScoredChunk>> {
    let mut chunks = Vec::with_capacity(k);
    for batch in batches {
        let texts = string_column(batch, text_column)
            .with_context(|| format!("result is missing utf8 column {text_column}"))?;
        let ids = string_column(batch, ID_COLUMN);
        let distances = batch
            .column_by_name(DISTANCE_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        for row in 0..batch.num_rows() {
            if chunks.len() == k {
                return Ok(chunks);
            }
            let id = ids
                .filter(|col| col.is_valid(row))
                .map(|col| col.value(row).to_string())
                .unwrap_or_else(|| row.to_string());
            let text = if texts.is_valid(row) {
                texts.value(row).to_string()
            } else {
                String::new()
            };
            let distance = distances
                .filter(|col| col.is_valid(row))
                .map(|col| col.value(row))
                .unwrap_or(f32::MAX);

            chunks.push(ScoredChunk {
                id,
                text,
                metadata: metadata(batch, row, text_column),
                distance,
            });
        }
    }
    Ok(chunks)
}

fn metadata(batch: &RecordBatch, row: usize, text_column: &str) -> BTreeMap<String, Value> {
    let schema = batch.schema();
    let mut metadata = BTreeMap::new();
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        let name = field.name();
        if name == ID_COLUMN || name == DISTANCE_COLUMN || name == text_column {
            continue;
        }
        if let Some(value) = scalar_at(column.as_ref(), row) {
            metadata.insert(name.clone(), value);
        }
    }
    metadata
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

/// Scalars only; vectors and nested columns are skipped.
fn scalar_at(column: &dyn Array, row: usize) -> Option<Value> {
    if column.is_null(row) {
        return None;
    }
    let any = column.as_any();
    if let Some(col) = any.downcast_ref::<StringArray>() {
        return Some(json!(col.value(row)));
    }
    if let Some(col) = any.downcast_ref::<Int64Array>() {
        return Some(json!(col.value(row)));
    }
    if let Some(col) = any.downcast_ref::<Int32Array>() {
        return Some(json!(col.value(row)));
    }
    if let Some(col) = any.downcast_ref::<Float64Array>() {
        return Some(json!(col.value(row)));
    }
    if let Some(col) = any.downcast_ref::<Float32Array>() {
        return Some(json!(col.value(row)));
    }
    if let Some(col) = any.downcast_ref::<BooleanArray>() {
        return Some(json!(col.value(row)));
    }
    None
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let batches: Vec<RecordBatch> = self
            .table
            .vector_search(embedding.to_vec())?
            .limit(k)
            .execute()
            .await?
            .try_collect()
            .await?;

        chunks_from_batches(&batches, &self.text_column, k)
    }
}
