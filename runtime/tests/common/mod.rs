#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Result, bail};
use async_trait::async_trait;
use rag_runtime::{
    ai::{
        ChatMessage, EmbeddingProvider, LanguageModel,
        prompts::{DEFAULT_FALLBACK_PHRASE, KNOWLEDGE_GRAPH_HEADER, TEXT_SOURCES_HEADER},
    },
    chat::{ConversationalGenerator, GeneratorConfig},
    graph::{EntityNode, GraphStore, LocalGraphStore, RelationEdge, Triple},
    retrieval::{
        EntityExtractor, GraphRetriever, HybridRetriever, ScoredChunk, VectorIndex,
        VectorRetriever,
    },
};

pub const TORTOISE_CHUNK: &str = "The tortoise won the race through persistence.";

pub const VOCABULARY: &[&str] = &[
    "tortoise",
    "hare",
    "race",
    "persistence",
    "lesson",
    "story",
    "lion",
    "mouse",
    "kindness",
    "net",
    "crow",
    "water",
    "pebbles",
];

/// Bag-of-words over a fixed vocabulary. Words outside it are ignored, so a
/// question with no corpus words embeds to the zero vector.
pub struct VocabularyEmbedder;

impl VocabularyEmbedder {
    pub fn embed(text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; VOCABULARY.len()];
        for token in text.split(|c: char| !c.is_alphanumeric()) {
            let token = token.to_lowercase();
            if let Some(idx) = VOCABULARY.iter().position(|w| *w == token) {
                vec[idx] += 1.0;
            }
        }
        vec
    }
}

#[async_trait]
impl EmbeddingProvider for VocabularyEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::embed(text))
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Brute-force index. Chunks with no similarity at all are not returned,
/// standing in for a store's relevance cut-off.
pub struct MemoryIndex {
    chunks: Vec<(String, String, Vec<f32>)>,
    down: AtomicBool,
}

impl MemoryIndex {
    pub fn new(texts: &[&str]) -> Self {
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                (
                    format!("chunk-{i}"),
                    text.to_string(),
                    VocabularyEmbedder::embed(text),
                )
            })
            .collect();
        Self {
            chunks,
            down: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if self.down.load(Ordering::SeqCst) {
            bail!("vector index unreachable");
        }
        let mut hits: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .filter_map(|(id, text, vector)| {
                let similarity = cosine(embedding, vector);
                (similarity > 0.0).then(|| ScoredChunk {
                    id: id.clone(),
                    text: text.clone(),
                    metadata: BTreeMap::new(),
                    distance: 1.0 - similarity,
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }
}

/// Graph store that fails for one specific needle and delegates otherwise.
pub struct FlakyStore {
    pub inner: LocalGraphStore,
    pub broken_needle: String,
}

#[async_trait]
impl GraphStore for FlakyStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn relations_matching(&self, needle: &str, limit: usize) -> Result<Vec<Triple>> {
        if needle == self.broken_needle {
            bail!("connection reset while matching '{needle}'");
        }
        self.inner.relations_matching(needle, limit).await
    }
}

/// Language model double.
///
/// Extraction prompts are answered from `entities` (first key contained in
/// the prompt wins). Answer prompts are answered from the fused context: the
/// fallback phrase when both sections are empty, otherwise a sentence quoting
/// the first line of whichever section has content.
pub struct ScriptedModel {
    entities: HashMap<String, String>,
    pub fail_answers: AtomicBool,
    pub fail_extraction: AtomicBool,
    pub answer_calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(entities: &[(&str, &str)]) -> Self {
        Self {
            entities: entities
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fail_answers: AtomicBool::new(false),
            fail_extraction: AtomicBool::new(false),
            answer_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn last_answer_call(&self) -> Vec<ChatMessage> {
        self.answer_calls
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }

    fn extraction(&self, prompt: &str) -> Result<String> {
        if self.fail_extraction.load(Ordering::SeqCst) {
            bail!("extraction model timed out");
        }
        Ok(self
            .entities
            .iter()
            .find(|(key, _)| prompt.contains(key.as_str()))
            .map(|(_, value)| value.clone())
            .unwrap_or_default())
    }

    fn answer(&self, messages: &[ChatMessage]) -> Result<String> {
        self.answer_calls.lock().unwrap().push(messages.to_vec());
        if self.fail_answers.load(Ordering::SeqCst) {
            bail!("completion endpoint returned 503");
        }
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        let (text, graph) = sections(last);
        let answer = match (text.lines().next(), graph.lines().next()) {
            (Some(line), _) => format!("According to the textbook: {line}"),
            (None, Some(line)) => format!("According to the knowledge graph: {line}"),
            (None, None) => DEFAULT_FALLBACK_PHRASE.to_string(),
        };
        Ok(answer)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        match messages {
            [only] if only.content.starts_with("Extract the main entities") => {
                self.extraction(&only.content)
            }
            _ => self.answer(messages),
        }
    }
}

/// Splits a grounded user turn into (text sources, knowledge graph) bodies.
pub fn sections(user_turn: &str) -> (String, String) {
    let context = user_turn
        .strip_prefix("Context:\n")
        .and_then(|rest| rest.rsplit_once("\n\nQuestion: "))
        .map(|(context, _)| context)
        .unwrap_or(user_turn);
    let after_text = context
        .split_once(&format!("{TEXT_SOURCES_HEADER}\n"))
        .map(|(_, rest)| rest)
        .unwrap_or("");
    let (text, graph) = after_text
        .split_once(&format!("\n\n{KNOWLEDGE_GRAPH_HEADER}\n"))
        .unwrap_or((after_text, ""));
    (text.to_string(), graph.to_string())
}

pub async fn fable_graph() -> Result<LocalGraphStore> {
    let store = LocalGraphStore::new();
    store
        .upsert_entity(EntityNode::new("Tortoise", "Character"))
        .await?;
    store.upsert_entity(EntityNode::new("Hare", "Character")).await?;
    store.upsert_entity(EntityNode::new("Ponnu", "Character")).await?;
    store
        .upsert_relation(RelationEdge::new("Tortoise", "RACED_AGAINST", "Hare"))
        .await?;
    store
        .upsert_relation(RelationEdge::new("Tortoise", "SHOWS", "Persistence"))
        .await?;
    store
        .upsert_relation(RelationEdge::new("Ponnu", "FRIEND_OF", "Meena"))
        .await?;
    Ok(store)
}

pub struct Harness {
    pub model: Arc<ScriptedModel>,
    pub index: Arc<MemoryIndex>,
    pub generator: ConversationalGenerator,
}

pub async fn harness(entities: &[(&str, &str)]) -> Result<Harness> {
    harness_with_store(entities, Arc::new(fable_graph().await?)).await
}

pub async fn harness_with_store(
    entities: &[(&str, &str)],
    store: Arc<dyn GraphStore>,
) -> Result<Harness> {
    let model = Arc::new(ScriptedModel::new(entities));
    let index = Arc::new(MemoryIndex::new(&[
        TORTOISE_CHUNK,
        "The lion spared the mouse, and the mouse later chewed through the net.",
        "The thirsty crow dropped pebbles into the pot until the water rose.",
    ]));

    let llm: Arc<dyn LanguageModel> = model.clone();
    let retriever = HybridRetriever::new(
        VectorRetriever::new(Arc::new(VocabularyEmbedder), index.clone()),
        GraphRetriever::new(EntityExtractor::new(llm.clone()), store, 5),
        3,
    );
    let generator = ConversationalGenerator::new(llm, retriever, GeneratorConfig::default())?;

    Ok(Harness {
        model,
        index,
        generator,
    })
}
