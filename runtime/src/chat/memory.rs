use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tokens::{TiktokenTokenizer, Tokenizer};
use crate::ai::ChatMessage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
    pub created_at: DateTime<Utc>,
}

/// How much history is replayed into the prompt. `0` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryWindow {
    #[serde(default)]
    pub max_turns: usize,
    #[serde(default)]
    pub max_history_tokens: usize,
}

impl HistoryWindow {
    pub fn unbounded() -> Self {
        Self::default()
    }
}

/// Session memory. Every turn is kept for inspection; the window only
/// decides what the model sees.
pub struct ConversationMemory {
    turns: Vec<Turn>,
    window: HistoryWindow,
    tokenizer: Option<Arc<dyn Tokenizer>>,
}

impl ConversationMemory {
    pub fn new(window: HistoryWindow) -> Result<Self> {
        let tokenizer: Option<Arc<dyn Tokenizer>> = if window.max_history_tokens > 0 {
            Some(Arc::new(TiktokenTokenizer::new()?))
        } else {
            None
        };
        Ok(Self::with_tokenizer(window, tokenizer))
    }

    pub fn with_tokenizer(window: HistoryWindow, tokenizer: Option<Arc<dyn Tokenizer>>) -> Self {
        Self {
            turns: Vec::new(),
            window,
            tokenizer,
        }
    }

    pub fn push(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.turns.push(Turn {
            user: user.into(),
            assistant: assistant.into(),
            created_at: Utc::now(),
        });
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Most recent turns that fit both bounds, oldest first.
    pub fn window(&self) -> &[Turn] {
        let mut start = match self.window.max_turns {
            0 => 0,
            max => self.turns.len().saturating_sub(max),
        };

        let budget = self.window.max_history_tokens;
        if let (true, Some(tokenizer)) = (budget > 0, self.tokenizer.as_ref()) {
            let mut used = 0usize;
            let mut keep_from = self.turns.len();
            for (idx, turn) in self.turns.iter().enumerate().skip(start).rev() {
                used += tokenizer.count(&turn.user) + tokenizer.count(&turn.assistant);
                if used > budget {
                    break;
                }
                keep_from = idx;
            }
            start = keep_from;
        }

        &self.turns[start..]
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.window()
            .iter()
            .flat_map(|turn| {
                [
                    ChatMessage::user(turn.user.clone()),
                    ChatMessage::assistant(turn.assistant.clone()),
                ]
            })
            .collect()
    }
}
