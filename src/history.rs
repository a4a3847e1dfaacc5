//! In-memory conversation history for the contextual endpoint.
//!
//! Each conversation id maps to an ordered list of question/answer turns.
//! History formatting caps the turns handed to the prompts so long sessions
//! do not blow the context window.

use crate::constants::MAX_HISTORY_TURNS;
use crate::prompts::NO_HISTORY;
use parking_lot::RwLock;
use std::collections::HashMap;

/// One completed question/answer exchange.
#[derive(Debug, Clone)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// Thread-safe per-conversation turn store.
#[derive(Debug, Default)]
pub struct ConversationStore {
    turns: RwLock<HashMap<String, Vec<Turn>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed turn under `conversation_id`.
    pub fn append(&self, conversation_id: &str, question: &str, answer: &str) {
        let mut turns = self.turns.write();
        turns
            .entry(conversation_id.to_string())
            .or_default()
            .push(Turn {
                question: question.to_string(),
                answer: answer.to_string(),
            });
    }

    /// Format the most recent turns for prompt injection. Returns
    /// [`NO_HISTORY`] when the conversation is empty or unknown.
    pub fn format_history(&self, conversation_id: &str) -> String {
        let turns = self.turns.read();
        let Some(entries) = turns.get(conversation_id) else {
            return NO_HISTORY.to_string();
        };
        if entries.is_empty() {
            return NO_HISTORY.to_string();
        }

        let start = entries.len().saturating_sub(MAX_HISTORY_TURNS);
        entries[start..]
            .iter()
            .map(|t| format!("User: {}\nAssistant: {}", t.question, t.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of stored turns for a conversation.
    pub fn turn_count(&self, conversation_id: &str) -> usize {
        self.turns
            .read()
            .get(conversation_id)
            .map(|t| t.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_conversation_has_no_history() {
        let store = ConversationStore::new();
        assert_eq!(store.format_history("missing"), NO_HISTORY);
    }

    #[test]
    fn test_append_and_format() {
        let store = ConversationStore::new();
        store.append("c1", "how much budget?", "100 total.");
        store.append("c1", "and spent?", "40 so far.");

        let history = store.format_history("c1");
        assert!(history.contains("User: how much budget?"));
        assert!(history.contains("Assistant: 40 so far."));
        assert_eq!(store.turn_count("c1"), 2);
    }

    #[test]
    fn test_history_is_capped() {
        let store = ConversationStore::new();
        for i in 0..(MAX_HISTORY_TURNS + 5) {
            store.append("c1", &format!("q{}", i), &format!("a{}", i));
        }
        let history = store.format_history("c1");
        assert!(!history.contains("User: q0\n"));
        assert!(history.contains(&format!("q{}", MAX_HISTORY_TURNS + 4)));
    }

    #[test]
    fn test_conversations_are_isolated() {
        let store = ConversationStore::new();
        store.append("a", "qa", "aa");
        store.append("b", "qb", "ab");
        assert!(store.format_history("a").contains("qa"));
        assert!(!store.format_history("a").contains("qb"));
    }
}
