//! Hybrid retrieval-augmented question answering over a fixed textbook corpus.
//!
//! A question is answered from two sources at once: nearest-neighbour chunks
//! from a vector index and entity triples from a knowledge graph. Both are
//! fused into one context block and handed to a language model that is
//! instructed to answer only from that block.

use std::sync::Arc;

pub mod ai;
pub mod bootstrap;
pub mod chat;
pub mod config;
pub mod graph;
pub mod retrieval;
pub mod routes;
pub mod startup;
pub mod storage;

use chat::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
}
