//! Conversation History
//!
//! Rolling window of completed turns for one conversation. The coordinator
//! appends a turn after each request; agents only ever read the last few
//! turns to resolve references like "delete that one".

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::DEFAULT_HISTORY_LIMIT;

/// Turns embedded in every classifier prompt
pub const CONTEXT_TURNS: usize = 3;

/// One user message and the reply it produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user: String,
    pub assistant: String,
}

impl ConversationTurn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// Append-only turn buffer with a retention bound
///
/// Turns are never edited. Once `capacity` is reached the oldest turn is
/// evicted to make room.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_LIMIT)),
            capacity,
        }
    }

    /// Record a completed turn
    pub fn push(&mut self, turn: ConversationTurn) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Last `n` turns in chronological order
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter().skip(self.turns.len().saturating_sub(n))
    }

    /// Prompt context block built from the last `CONTEXT_TURNS` turns
    pub fn context_block(&self) -> String {
        self.recent(CONTEXT_TURNS)
            .map(|turn| format!("User: {}\nAssistant: {}\n", turn.user, turn.assistant))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}
