use std::{env, path::PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tokio::fs;
use tracing::info;

use crate::{
    ai::prompts::{DEFAULT_FALLBACK_PHRASE, DEFAULT_SUBJECT},
    chat::{GeneratorConfig, HistoryWindow, SessionConfig},
    retrieval::{DEFAULT_PER_ENTITY_LIMIT, DEFAULT_TOP_K},
};

pub const DEFAULT_CONFIG_PATH: &str = "config/app.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub vector: VectorConfig,
    pub graph: GraphConfig,
    pub memory: HistoryWindow,
    pub sessions: SessionConfig,
    pub prompts: PromptConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            chat_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            temperature: 0.0,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    pub uri: String,
    pub table: String,
    pub text_column: String,
    pub top_k: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            uri: "data/lancedb".to_string(),
            table: "textbook_rag".to_string(),
            text_column: "text".to_string(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphBackend {
    #[default]
    Neo4j,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub backend: GraphBackend,
    pub per_entity_limit: usize,
    /// Where the local backend keeps its JSON snapshot.
    pub working_dir: PathBuf,
    pub ensure_schema: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: GraphBackend::Neo4j,
            per_entity_limit: DEFAULT_PER_ENTITY_LIMIT,
            working_dir: PathBuf::from("data/graph"),
            ensure_schema: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub subject: String,
    pub fallback_phrase: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            subject: DEFAULT_SUBJECT.to_string(),
            fallback_phrase: DEFAULT_FALLBACK_PHRASE.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.vector.top_k == 0 {
            bail!("vector.top_k must be at least 1");
        }
        if self.graph.per_entity_limit == 0 {
            bail!("graph.per_entity_limit must be at least 1");
        }
        if self.prompts.fallback_phrase.trim().is_empty() {
            bail!("prompts.fallback_phrase must not be empty");
        }
        Ok(())
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            subject: self.prompts.subject.clone(),
            fallback_phrase: self.prompts.fallback_phrase.clone(),
            window: self.memory,
        }
    }
}

pub async fn load_config() -> Result<AppConfig> {
    let path = config_path();
    let contents = fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config = AppConfig::from_yaml_str(&contents)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    info!(path = %path.display(), "Configuration loaded from disk");
    Ok(config)
}

pub fn config_path() -> PathBuf {
    env::var("APP_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}
