use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::{
    memory::{ConversationMemory, HistoryWindow, Turn},
    tokens::{TiktokenTokenizer, Tokenizer},
};
use crate::{
    ai::{
        ChatMessage, LanguageModel,
        prompts::{
            DEFAULT_FALLBACK_PHRASE, DEFAULT_SUBJECT, grounded_system_prompt, grounded_user_turn,
        },
    },
    retrieval::{HybridRetriever, QueryContext},
};

#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub subject: String,
    pub fallback_phrase: String,
    pub window: HistoryWindow,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            subject: DEFAULT_SUBJECT.to_string(),
            fallback_phrase: DEFAULT_FALLBACK_PHRASE.to_string(),
            window: HistoryWindow::unbounded(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    /// The fused block exactly as the model saw it.
    pub context: String,
    pub retrieved: QueryContext,
}

/// Answers questions from retrieved context, one conversation per instance.
///
/// History is appended only after the model returns; a failed extraction or
/// generation call leaves it untouched.
pub struct ConversationalGenerator {
    llm: Arc<dyn LanguageModel>,
    retriever: HybridRetriever,
    system_prompt: String,
    memory: ConversationMemory,
}

impl ConversationalGenerator {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        retriever: HybridRetriever,
        config: GeneratorConfig,
    ) -> Result<Self> {
        let memory = ConversationMemory::new(config.window)
            .context("failed to initialize conversation memory")?;
        Ok(Self::with_memory(llm, retriever, &config, memory))
    }

    pub fn with_memory(
        llm: Arc<dyn LanguageModel>,
        retriever: HybridRetriever,
        config: &GeneratorConfig,
        memory: ConversationMemory,
    ) -> Self {
        Self {
            llm,
            retriever,
            system_prompt: grounded_system_prompt(&config.subject, &config.fallback_phrase),
            memory,
        }
    }

    pub fn builder(llm: Arc<dyn LanguageModel>, retriever: HybridRetriever) -> GeneratorBuilder {
        GeneratorBuilder::new(llm, retriever)
    }

    pub async fn respond(&mut self, question: &str) -> Result<Answer> {
        let retrieved = self.retriever.retrieve(question).await?;
        let context = retrieved.render();
        debug!(
            chunks = retrieved.chunks.len(),
            triples = retrieved.triples.len(),
            "context fused"
        );

        let messages = self.build_messages(&context, question);
        let answer = self
            .llm
            .complete(&messages)
            .await
            .context("answer generation failed")?;

        self.memory.push(question, answer.clone());
        info!(
            turns = self.memory.len(),
            grounded = !retrieved.is_empty(),
            "answer generated"
        );

        Ok(Answer {
            answer,
            context,
            retrieved,
        })
    }

    /// System instruction, windowed history, then the grounded question.
    pub fn build_messages(&self, context: &str, question: &str) -> Vec<ChatMessage> {
        let history = self.memory.messages();
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(history);
        messages.push(ChatMessage::user(grounded_user_turn(context, question)));
        messages
    }

    pub fn reset(&mut self) {
        self.memory.clear();
    }

    pub fn history(&self) -> &[Turn] {
        self.memory.turns()
    }
}

/// Per-session template. The tokenizer behind the history budget is loaded
/// once here and shared by every generator built from it.
#[derive(Clone)]
pub struct GeneratorBuilder {
    llm: Arc<dyn LanguageModel>,
    retriever: HybridRetriever,
    config: GeneratorConfig,
    tokenizer: Option<Arc<dyn Tokenizer>>,
}

impl GeneratorBuilder {
    fn new(llm: Arc<dyn LanguageModel>, retriever: HybridRetriever) -> Self {
        Self {
            llm,
            retriever,
            config: GeneratorConfig::default(),
            tokenizer: None,
        }
    }

    /// Loads `o200k_base` when the window has a token budget and the template
    /// does not hold a tokenizer yet.
    pub fn config(mut self, config: GeneratorConfig) -> Result<Self> {
        if config.window.max_history_tokens > 0 && self.tokenizer.is_none() {
            let tokenizer =
                TiktokenTokenizer::new().context("failed to load history tokenizer")?;
            self.tokenizer = Some(Arc::new(tokenizer));
        }
        self.config = config;
        Ok(self)
    }

    pub fn build(&self) -> ConversationalGenerator {
        let memory = ConversationMemory::with_tokenizer(self.config.window, self.tokenizer.clone());
        ConversationalGenerator::with_memory(
            self.llm.clone(),
            self.retriever.clone(),
            &self.config,
            memory,
        )
    }
}
