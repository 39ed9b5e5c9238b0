use std::collections::BTreeSet;

use serde::Serialize;

use crate::ai::prompts::{KNOWLEDGE_GRAPH_HEADER, TEXT_SOURCES_HEADER};

/// Everything retrieved for one question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryContext {
    pub chunks: Vec<String>,
    pub triples: BTreeSet<String>,
}

impl QueryContext {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.triples.is_empty()
    }

    pub fn render(&self) -> String {
        fuse(&self.chunks, &self.triples)
    }
}

/// Text chunks (blank-line separated, in retrieval order) followed by graph
/// triples (one per line). Both headers are always present, so an empty
/// section still shows which source came back empty.
pub fn fuse<'a, I>(chunks: &[String], triples: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let context_text = chunks.join("\n\n");
    let context_graph = triples
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");

    format!("{TEXT_SOURCES_HEADER}\n{context_text}\n\n{KNOWLEDGE_GRAPH_HEADER}\n{context_graph}")
}
