//! Relaybot: a Discord bot that relays mentions, replies and PDF attachments
//! to a Grok-compatible chat completion API.

pub mod agent;
pub mod config;
pub mod conversation;
pub mod document;
pub mod error;
pub mod llm;
pub mod messaging;

pub use error::{Error, Result};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifies one history buffer: a single user in a single channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub user_id: String,
    pub channel_id: String,
}

impl ConversationKey {
    pub fn new(user_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.user_id, self.channel_id)
    }
}

/// Inbound message from the chat platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub sender_id: String,
    pub channel_id: String,
    /// Message text with the bot mention already stripped.
    pub text: String,
    pub attachments: Vec<Attachment>,
    /// True when the bot was mentioned or the message replies to the bot.
    pub addressed: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl InboundMessage {
    pub fn conversation_key(&self) -> ConversationKey {
        ConversationKey::new(&self.sender_id, &self.channel_id)
    }
}

/// File attachment metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
}

impl Attachment {
    /// Lowercased file extension, if the filename has one.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
    }

    pub fn is_pdf(&self) -> bool {
        self.extension().as_deref() == Some("pdf")
    }

    pub fn is_image(&self) -> bool {
        matches!(self.extension().as_deref(), Some("jpg" | "jpeg" | "png"))
    }
}

/// Status updates for the chat platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusUpdate {
    Thinking,
    /// Cancel the typing indicator.
    StopTyping,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(filename: &str) -> Attachment {
        Attachment {
            filename: filename.into(),
            url: format!("https://cdn.example.com/{filename}"),
        }
    }

    #[test]
    fn attachment_kinds_ignore_case() {
        assert!(attachment("Report.PDF").is_pdf());
        assert!(attachment("photo.JPeG").is_image());
        assert!(attachment("shot.png").is_image());
        assert!(!attachment("notes.txt").is_pdf());
        assert!(!attachment("anim.gif").is_image());
        assert!(!attachment("no_extension").is_image());
    }

    #[test]
    fn conversation_key_display() {
        let key = ConversationKey::new("42", "7");
        assert_eq!(key.to_string(), "42_7");
    }
}
