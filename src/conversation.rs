//! Conversation history and context management.

pub mod history;

pub use history::{HistoryStore, Role, Turn};
