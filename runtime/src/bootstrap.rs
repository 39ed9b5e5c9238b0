use std::{env, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    ai::{LanguageModel, OpenAiChat, OpenAiEmbedder, ResponsesClient},
    chat::{ConversationalGenerator, GeneratorBuilder},
    config::{AppConfig, GraphBackend, GraphConfig},
    graph::{GraphStore, GraphWriter, LocalGraphStore, Neo4jGraphStore},
    retrieval::{EntityExtractor, GraphRetriever, HybridRetriever, LanceVectorIndex, VectorRetriever},
};

/// Wires the external clients named in `config` into a generator template.
/// Each conversation gets its own generator built from it.
pub async fn generator_template(config: &AppConfig) -> Result<GeneratorBuilder> {
    let api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;
    let client = Arc::new(ResponsesClient::new(
        api_key,
        config.llm.base_url.clone(),
        Duration::from_secs(config.llm.request_timeout_secs),
    )?);

    let llm: Arc<dyn LanguageModel> = Arc::new(OpenAiChat::new(
        client.clone(),
        &config.llm.chat_model,
        config.llm.temperature,
    ));
    let embedder = Arc::new(OpenAiEmbedder::new(client, &config.llm.embedding_model));

    let index = Arc::new(
        LanceVectorIndex::open(
            &config.vector.uri,
            &config.vector.table,
            &config.vector.text_column,
        )
        .await?,
    );

    let store = graph_store(&config.graph).await?;
    if config.graph.ensure_schema {
        store.ensure_schema().await?;
    }

    let retriever = HybridRetriever::new(
        VectorRetriever::new(embedder, index),
        GraphRetriever::new(
            EntityExtractor::new(llm.clone()),
            store,
            config.graph.per_entity_limit,
        ),
        config.vector.top_k,
    );

    info!(
        model = %config.llm.chat_model,
        top_k = config.vector.top_k,
        graph = ?config.graph.backend,
        "retrieval engine ready"
    );

    Ok(ConversationalGenerator::builder(llm, retriever).config(config.generator_config())?)
}

pub async fn graph_store(config: &GraphConfig) -> Result<Arc<dyn GraphStore>> {
    let store: Arc<dyn GraphStore> = match config.backend {
        GraphBackend::Neo4j => Arc::new(Neo4jGraphStore::from_env().await?),
        GraphBackend::Local => Arc::new(open_local(config).await?),
    };
    Ok(store)
}

/// Same backend selection as [`graph_store`], for tools that write.
pub async fn graph_writer(config: &GraphConfig) -> Result<Box<dyn GraphWriter>> {
    let writer: Box<dyn GraphWriter> = match config.backend {
        GraphBackend::Neo4j => {
            let store = Neo4jGraphStore::from_env().await?;
            store.ensure_schema().await?;
            Box::new(store)
        }
        GraphBackend::Local => Box::new(open_local(config).await?),
    };
    Ok(writer)
}

async fn open_local(config: &GraphConfig) -> Result<LocalGraphStore> {
    let workspace = env::var("WORKSPACE")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    LocalGraphStore::open(config.working_dir.clone(), workspace).await
}
