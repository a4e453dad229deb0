//! In-memory conversation history, bounded by character count.

use crate::ConversationKey;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Default)]
struct HistoryBuffer {
    turns: VecDeque<Turn>,
    /// Sum of `content` lengths in chars.
    chars: usize,
}

impl HistoryBuffer {
    fn push(&mut self, turn: Turn, max_chars: usize) {
        self.chars += turn.content.chars().count();
        self.turns.push_back(turn);

        while self.chars > max_chars && self.turns.len() > 1 {
            if let Some(evicted) = self.turns.pop_front() {
                self.chars -= evicted.content.chars().count();
            }
        }

        // A single turn larger than the whole budget keeps only its tail.
        if self.chars > max_chars {
            if let Some(last) = self.turns.back_mut() {
                let excess = self.chars - max_chars;
                last.content = last.content.chars().skip(excess).collect();
                self.chars = max_chars;
            }
            if self.turns.back().is_some_and(|turn| turn.content.is_empty()) {
                self.turns.pop_back();
            }
        }
    }
}

/// Per-(user, channel) transcripts used as language-model context.
///
/// Buffers are created lazily on first append and live until the process
/// exits. Each buffer holds at most `max_chars` characters of turn content;
/// appends that overflow evict the oldest turns first.
///
/// The store is owned by the sequential dispatch loop, so it takes `&mut self`
/// and does no locking. Handling messages concurrently would require
/// serializing `turns` + `append` per key.
#[derive(Debug)]
pub struct HistoryStore {
    max_chars: usize,
    buffers: HashMap<ConversationKey, HistoryBuffer>,
}

impl HistoryStore {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            buffers: HashMap::new(),
        }
    }

    /// Rendered transcript for a conversation, one `role: content` line per
    /// turn. Empty when nothing has been recorded.
    pub fn get(&self, key: &ConversationKey) -> String {
        self.turns(key)
            .map(|turn| format!("{}: {}", turn.role, turn.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Turns for a conversation, oldest first.
    pub fn turns<'a>(&'a self, key: &ConversationKey) -> impl Iterator<Item = &'a Turn> + 'a {
        self.buffers
            .get(key)
            .into_iter()
            .flat_map(|buffer| buffer.turns.iter())
    }

    /// Record a turn, evicting old content if the buffer overflows.
    pub fn append(&mut self, key: &ConversationKey, role: Role, content: impl Into<String>) {
        let max_chars = self.max_chars;
        let buffer = self.buffers.entry(key.clone()).or_default();
        buffer.push(
            Turn {
                role,
                content: content.into(),
            },
            max_chars,
        );

        tracing::debug!(
            conversation = %key,
            %role,
            turns = buffer.turns.len(),
            chars = buffer.chars,
            "history appended"
        );
    }

    pub fn clear(&mut self, key: &ConversationKey) {
        self.buffers.remove(key);
    }

    /// Characters of turn content currently held for a conversation.
    pub fn len_chars(&self, key: &ConversationKey) -> usize {
        self.buffers.get(key).map_or(0, |buffer| buffer.chars)
    }

    /// Number of conversations with recorded history.
    pub fn conversation_count(&self) -> usize {
        self.buffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ConversationKey {
        ConversationKey::new("user", "channel")
    }

    fn retained(store: &HistoryStore, key: &ConversationKey) -> String {
        store.turns(key).map(|turn| turn.content.as_str()).collect()
    }

    #[test]
    fn unknown_key_is_empty() {
        let store = HistoryStore::new(100);
        assert_eq!(store.get(&key()), "");
        assert_eq!(store.turns(&key()).count(), 0);
        assert_eq!(store.len_chars(&key()), 0);
    }

    #[test]
    fn get_renders_roles() {
        let mut store = HistoryStore::new(100);
        store.append(&key(), Role::User, "hi");
        store.append(&key(), Role::Assistant, "hello");
        assert_eq!(store.get(&key()), "user: hi\nassistant: hello");
    }

    #[test]
    fn evicts_oldest_turns_first() {
        let mut store = HistoryStore::new(10);
        store.append(&key(), Role::User, "aaaa");
        store.append(&key(), Role::Assistant, "bbbb");
        store.append(&key(), Role::User, "cccc");

        let turns: Vec<_> = store.turns(&key()).cloned().collect();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "bbbb");
        assert_eq!(turns[1].content, "cccc");
        assert_eq!(store.len_chars(&key()), 8);
    }

    #[test]
    fn oversized_turn_keeps_its_tail() {
        let mut store = HistoryStore::new(5);
        store.append(&key(), Role::User, "ab");
        store.append(&key(), Role::Assistant, "0123456789");

        let turns: Vec<_> = store.turns(&key()).cloned().collect();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::Assistant);
        assert_eq!(turns[0].content, "56789");
    }

    #[test]
    fn counts_characters_not_bytes() {
        let mut store = HistoryStore::new(4);
        store.append(&key(), Role::User, "héé");
        store.append(&key(), Role::User, "ñ");
        assert_eq!(store.len_chars(&key()), 4);
        assert_eq!(retained(&store, &key()), "hééñ");
    }

    #[test]
    fn bounded_suffix_over_many_appends() {
        let max = 1_000;
        let mut store = HistoryStore::new(max);
        let mut unbounded = String::new();
        let mut seed: u64 = 0x9e37_79b9;

        for index in 0..500 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let length = (seed >> 33) as usize % 400;
            let letter = char::from(b'a' + (index % 26) as u8);
            let content: String = std::iter::repeat_n(letter, length).collect();
            let role = if index % 2 == 0 { Role::User } else { Role::Assistant };

            unbounded.push_str(&content);
            store.append(&key(), role, content);

            let kept = retained(&store, &key());
            assert!(kept.chars().count() <= max);
            assert_eq!(store.len_chars(&key()), kept.chars().count());
            assert!(unbounded.ends_with(&kept));
        }
    }

    #[test]
    fn keys_are_independent() {
        let mut store = HistoryStore::new(100);
        let other = ConversationKey::new("user", "elsewhere");
        store.append(&key(), Role::User, "one");
        store.append(&other, Role::User, "two");
        store.clear(&key());

        assert_eq!(store.get(&key()), "");
        assert_eq!(store.get(&other), "user: two");
        assert_eq!(store.conversation_count(), 1);
    }
}
