use std::{collections::BTreeSet, sync::Arc};

use anyhow::Result;
use tracing::debug;

use crate::ai::{ChatMessage, LanguageModel, prompts::entity_extraction_prompt};

/// Asks the language model for the nouns in a question.
///
/// Output is a set of hints, not facts: the model may invent names or miss
/// some, and names absent from the graph simply match nothing.
#[derive(Clone)]
pub struct EntityExtractor {
    llm: Arc<dyn LanguageModel>,
}

impl EntityExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    pub async fn extract(&self, query: &str) -> Result<BTreeSet<String>> {
        let raw = self
            .llm
            .complete(&[ChatMessage::user(entity_extraction_prompt(query))])
            .await?;
        let entities = parse_entity_list(&raw);
        debug!(?entities, "extracted entities");
        Ok(entities)
    }
}

/// Comma-split, trimmed. Blank pieces are dropped: an empty needle would
/// match every edge in the graph.
pub fn parse_entity_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}
