pub const DEFAULT_FALLBACK_PHRASE: &str = "I cannot find the answer in the textbook.";
pub const DEFAULT_SUBJECT: &str = "Class 6 English";

pub const TEXT_SOURCES_HEADER: &str = "### TEXT SOURCES:";
pub const KNOWLEDGE_GRAPH_HEADER: &str = "### KNOWLEDGE GRAPH:";

pub fn entity_extraction_prompt(query: &str) -> String {
    format!(
        "Extract the main entities (nouns, proper nouns) from this query as a comma-separated list: {query}"
    )
}

/// The grounding contract. The fallback phrase is embedded verbatim so the
/// model can reproduce it exactly when the context does not cover the question.
pub fn grounded_system_prompt(subject: &str, fallback_phrase: &str) -> String {
    format!(
        "You are a helpful educational assistant for {subject}.\n\
         Answer the user's question using ONLY the provided context.\n\
         If the answer is not in the context, say \"{fallback_phrase}\"\n\
         \n\
         Combine information from both the text sources and the knowledge graph to provide a complete answer."
    )
}

pub fn grounded_user_turn(context: &str, question: &str) -> String {
    format!("Context:\n{context}\n\nQuestion: {question}")
}
