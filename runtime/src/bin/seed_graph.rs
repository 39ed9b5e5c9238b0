use std::{env, path::PathBuf};

use anyhow::{Context, Result};
use rag_runtime::{bootstrap, config, graph::GraphFixture, startup};
use tokio::fs;
use tracing::info;

/// Loads `{ "nodes": [..], "edges": [..] }` into the configured graph backend.
/// Re-running with the same file is a no-op.
#[tokio::main]
async fn main() -> Result<()> {
    startup::init_tracing("info");
    startup::load_env_file(None);

    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: seed_graph <graph.json>")?;
    let contents = fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let fixture = GraphFixture::from_json_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let config = config::load_config().await?;
    let writer = bootstrap::graph_writer(&config.graph).await?;
    fixture.apply(writer.as_ref()).await?;

    info!(
        nodes = fixture.nodes.len(),
        edges = fixture.edges.len(),
        backend = ?config.graph.backend,
        "graph seeded"
    );
    Ok(())
}
