use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::chat::Turn;

#[derive(Clone, Debug, Deserialize, TS, Serialize)]
#[ts(export)]
pub struct ChatRequest {
    /// Omit to start a new conversation.
    #[serde(default)]
    pub session_id: Option<String>,
    pub question: String,
}

#[derive(Clone, Debug, Deserialize, TS, Serialize)]
#[ts(export)]
pub struct ChatResponse {
    pub session_id: String,
    pub answer: String,
    /// Fused retrieval context, surfaced so callers can audit grounding.
    pub context: String,
}

#[derive(Clone, Debug, Deserialize, TS, Serialize)]
#[ts(export)]
pub struct TurnResponse {
    pub user: String,
    pub assistant: String,
    pub created_at: String,
}

impl From<&Turn> for TurnResponse {
    fn from(turn: &Turn) -> Self {
        Self {
            user: turn.user.clone(),
            assistant: turn.assistant.clone(),
            created_at: turn.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize, TS)]
#[ts(export)]
pub struct HistoryResponse {
    pub session_id: String,
    pub turns: Vec<TurnResponse>,
}
