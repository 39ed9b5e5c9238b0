mod common;

use std::{collections::BTreeSet, sync::Arc, sync::atomic::Ordering};

use anyhow::Result;
use common::{
    FlakyStore, MemoryIndex, TORTOISE_CHUNK, VocabularyEmbedder, fable_graph, harness,
    harness_with_store, sections,
};
use rag_runtime::{
    ai::{LanguageModel, Role, prompts::DEFAULT_FALLBACK_PHRASE},
    graph::{LocalGraphStore, RelationEdge},
    retrieval::{EntityExtractor, GraphRetriever, VectorRetriever},
};

const TORTOISE_QUESTION: &str = "What lesson does the tortoise story teach?";

fn entity_script() -> Vec<(&'static str, &'static str)> {
    vec![
        ("tortoise story", "Tortoise, story, lesson"),
        ("France", "capital, France"),
        ("Ponnu", "Ponnu"),
    ]
}

#[tokio::test]
async fn hybrid_answer_uses_text_and_graph() -> Result<()> {
    let mut h = harness(&entity_script()).await?;

    let answer = h.generator.respond(TORTOISE_QUESTION).await?;

    assert!(answer.context.starts_with("### TEXT SOURCES:\n"));
    assert!(answer.context.contains(TORTOISE_CHUNK));
    assert!(
        answer
            .context
            .contains("Tortoise --[RACED_AGAINST]--> Hare")
    );
    assert!(answer.context.contains("Tortoise --[SHOWS]--> Persistence"));
    assert_ne!(answer.answer, DEFAULT_FALLBACK_PHRASE);
    assert!(answer.answer.contains("persistence"));
    Ok(())
}

#[tokio::test]
async fn out_of_scope_question_gets_fallback() -> Result<()> {
    let mut h = harness(&entity_script()).await?;

    let answer = h
        .generator
        .respond("What is the capital of France?")
        .await?;

    assert_eq!(answer.context, "### TEXT SOURCES:\n\n\n### KNOWLEDGE GRAPH:\n");
    assert!(answer.retrieved.is_empty());
    assert_eq!(answer.answer, DEFAULT_FALLBACK_PHRASE);
    Ok(())
}

#[tokio::test]
async fn graph_only_answer() -> Result<()> {
    let mut h = harness(&entity_script()).await?;

    let answer = h.generator.respond("Who is Ponnu's friend?").await?;

    let (text, graph) = sections(&format!("Context:\n{}\n\nQuestion: q", answer.context));
    assert!(text.is_empty());
    assert_eq!(graph, "Ponnu --[FRIEND_OF]--> Meena");
    assert!(answer.answer.contains("Meena"));
    Ok(())
}

#[tokio::test]
async fn vector_outage_still_answers_from_graph() -> Result<()> {
    let mut h = harness(&entity_script()).await?;
    h.index.set_down(true);

    let answer = h.generator.respond(TORTOISE_QUESTION).await?;

    assert!(answer.retrieved.chunks.is_empty());
    assert!(
        answer
            .context
            .starts_with("### TEXT SOURCES:\n\n\n### KNOWLEDGE GRAPH:\nTortoise")
    );
    assert!(answer.answer.contains("knowledge graph"));
    assert_eq!(h.generator.history().len(), 1);
    Ok(())
}

#[tokio::test]
async fn extraction_outage_fails_without_recording_history() -> Result<()> {
    let mut h = harness(&entity_script()).await?;
    h.generator.respond(TORTOISE_QUESTION).await?;
    let answer_calls = h.model.answer_calls.lock().unwrap().len();

    h.model.fail_extraction.store(true, Ordering::SeqCst);
    let err = h
        .generator
        .respond("Who is Ponnu's friend?")
        .await
        .unwrap_err();

    let message = format!("{err:#}");
    assert!(message.contains("entity extraction failed"));
    assert!(message.contains("extraction model timed out"));
    assert_eq!(h.generator.history().len(), 1);
    assert_eq!(h.model.answer_calls.lock().unwrap().len(), answer_calls);
    Ok(())
}

#[tokio::test]
async fn history_grows_one_turn_per_answer_and_is_replayed() -> Result<()> {
    let mut h = harness(&entity_script()).await?;

    let questions = [
        TORTOISE_QUESTION,
        "Who is Ponnu's friend?",
        "What is the capital of France?",
    ];
    for question in questions {
        h.generator.respond(question).await?;
    }

    let history = h.generator.history();
    assert_eq!(history.len(), 3);
    for (turn, question) in history.iter().zip(questions) {
        assert_eq!(turn.user, question);
    }
    assert_eq!(history[2].assistant, DEFAULT_FALLBACK_PHRASE);

    h.generator.respond("And the hare?").await?;
    let sent = h.model.last_answer_call();
    assert_eq!(sent.len(), 1 + 3 * 2 + 1);
    assert_eq!(sent[0].role, Role::System);
    assert!(sent[0].content.contains(DEFAULT_FALLBACK_PHRASE));
    assert_eq!(sent[1].role, Role::User);
    assert_eq!(sent[1].content, TORTOISE_QUESTION);
    assert_eq!(sent[2].role, Role::Assistant);
    assert_eq!(sent[2].content, h.generator.history()[0].assistant);
    let last = sent.last().unwrap();
    assert_eq!(last.role, Role::User);
    assert!(last.content.starts_with("Context:\n### TEXT SOURCES:\n"));
    assert!(last.content.ends_with("\n\nQuestion: And the hare?"));
    Ok(())
}

#[tokio::test]
async fn failed_generation_leaves_history_untouched() -> Result<()> {
    let mut h = harness(&entity_script()).await?;
    h.generator.respond(TORTOISE_QUESTION).await?;

    h.model.fail_answers.store(true, Ordering::SeqCst);
    let err = h
        .generator
        .respond("Who is Ponnu's friend?")
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("503"));
    assert_eq!(h.generator.history().len(), 1);

    h.model.fail_answers.store(false, Ordering::SeqCst);
    h.generator.respond("Who is Ponnu's friend?").await?;
    assert_eq!(h.generator.history().len(), 2);
    Ok(())
}

#[tokio::test]
async fn reset_starts_a_fresh_conversation() -> Result<()> {
    let mut h = harness(&entity_script()).await?;
    h.generator.respond(TORTOISE_QUESTION).await?;
    h.generator.reset();
    assert!(h.generator.history().is_empty());

    h.generator.respond("Who is Ponnu's friend?").await?;
    assert_eq!(h.model.last_answer_call().len(), 2);
    Ok(())
}

#[tokio::test]
async fn vector_search_returns_at_most_k_closest_first() -> Result<()> {
    let index = Arc::new(MemoryIndex::new(&[
        "The lion and the mouse.",
        TORTOISE_CHUNK,
        "The hare slept during the race.",
        "The crow and the water pot.",
    ]));
    let retriever = VectorRetriever::new(Arc::new(VocabularyEmbedder), index);

    let top = retriever.search("tortoise race persistence", 2).await;
    assert_eq!(top.len(), 2);
    assert_eq!(top[0], TORTOISE_CHUNK);
    assert_eq!(top[1], "The hare slept during the race.");

    let one = retriever.search("lion mouse crow water", 1).await;
    assert_eq!(one.len(), 1);
    Ok(())
}

#[tokio::test]
async fn graph_search_extracts_then_looks_up() -> Result<()> {
    let h = harness(&entity_script()).await?;
    let llm: Arc<dyn LanguageModel> = h.model.clone();
    let retriever = GraphRetriever::new(
        EntityExtractor::new(llm),
        Arc::new(fable_graph().await?),
        5,
    );

    let triples = retriever.search("Who is Ponnu's friend?").await?;
    let expected: BTreeSet<String> = ["Ponnu --[FRIEND_OF]--> Meena".to_string()].into();
    assert_eq!(triples, expected);

    assert!(retriever.search("Where is the moon?").await?.is_empty());

    h.model.fail_extraction.store(true, Ordering::SeqCst);
    let err = retriever.search("Who is Ponnu's friend?").await.unwrap_err();
    assert!(format!("{err:#}").contains("entity extraction failed"));
    Ok(())
}

#[tokio::test]
async fn graph_triples_are_deduplicated_across_entities() -> Result<()> {
    let h = harness(&[]).await?;
    let llm: Arc<dyn LanguageModel> = h.model.clone();
    let retriever = GraphRetriever::new(
        EntityExtractor::new(llm),
        Arc::new(fable_graph().await?),
        5,
    );

    let entities: BTreeSet<String> = ["Tortoise", "Hare"].map(String::from).into();
    let triples = retriever.search_entities(&entities).await;

    assert_eq!(triples.len(), 2);
    assert!(triples.contains("Tortoise --[RACED_AGAINST]--> Hare"));
    assert!(triples.contains("Tortoise --[SHOWS]--> Persistence"));
    Ok(())
}

#[tokio::test]
async fn graph_lookup_is_case_sensitive_and_limited_per_entity() -> Result<()> {
    let store = LocalGraphStore::new();
    for chapter in 1..=7 {
        store
            .upsert_relation(RelationEdge::new(
                "Chapter",
                "MENTIONS",
                format!("Character {chapter}"),
            ))
            .await?;
    }
    let h = harness(&[]).await?;
    let llm: Arc<dyn LanguageModel> = h.model.clone();
    let retriever = GraphRetriever::new(EntityExtractor::new(llm), Arc::new(store), 5);

    let upper: BTreeSet<String> = ["Chapter".to_string()].into();
    assert_eq!(retriever.search_entities(&upper).await.len(), 5);

    let lower: BTreeSet<String> = ["chapter".to_string()].into();
    assert!(retriever.search_entities(&lower).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn failing_entity_lookup_does_not_drop_the_others() -> Result<()> {
    let store = Arc::new(FlakyStore {
        inner: fable_graph().await?,
        broken_needle: "Hare".to_string(),
    });
    let mut h = harness_with_store(&[("hare", "Hare, Ponnu")], store).await?;

    let answer = h
        .generator
        .respond("Did the hare meet Ponnu?")
        .await?;

    let expected: BTreeSet<String> = ["Ponnu --[FRIEND_OF]--> Meena".to_string()].into();
    assert_eq!(answer.retrieved.triples, expected);
    Ok(())
}
