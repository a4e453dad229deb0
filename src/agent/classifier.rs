//! Decide how an inbound message should be handled.
//!
//! Classification is plain pattern matching over an ordered rule list.
//! Attachments are unambiguous signals, so the attachment rules run before
//! the keyword heuristics; the first rule that matches wins.

use crate::{Attachment, InboundMessage};

use regex::Regex;
use std::sync::LazyLock;

static IMAGE_GENERATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(generate|create|draw)\s+.*\b(image|picture|art)\b")
        .expect("hardcoded regex")
});

const SIMPLE_QUESTION_PREFIXES: &[&str] = &[
    "what is",
    "who is",
    "when is",
    "where is",
    "how many",
    "define",
    "explain",
    "tell me about",
    "what are",
    "can you tell me",
    "is it",
    "what's",
    "who's",
    "why is",
    "how does",
    "what's the",
];

/// Target length band passed to the model as a generation hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseLength {
    /// One or two sentences.
    Short,
    /// Up to the platform reply limit.
    Long,
}

/// The handling path chosen for a message.
#[derive(Debug, Clone)]
pub enum Disposition {
    /// Extract the document's text and answer it like a text query.
    Pdf { attachment: Attachment },
    /// An uploaded image. Answered with a fixed message.
    ImageUpload { attachment: Attachment },
    ImageGeneration { prompt: String },
    Text {
        text: String,
        length: ResponseLength,
    },
}

impl Disposition {
    pub fn kind(&self) -> &'static str {
        match self {
            Disposition::Pdf { .. } => "pdf",
            Disposition::ImageUpload { .. } => "image_upload",
            Disposition::ImageGeneration { .. } => "image_generation",
            Disposition::Text { .. } => "text",
        }
    }
}

struct Rule {
    name: &'static str,
    apply: fn(&InboundMessage) -> Option<Disposition>,
}

/// Evaluated top to bottom. Order is the tie-break.
static RULES: &[Rule] = &[
    Rule {
        name: "pdf",
        apply: pdf_rule,
    },
    Rule {
        name: "image_upload",
        apply: image_upload_rule,
    },
    Rule {
        name: "image_generation",
        apply: image_generation_rule,
    },
    Rule {
        name: "text",
        apply: text_rule,
    },
];

/// Rule names in evaluation order.
pub fn rule_order() -> impl Iterator<Item = &'static str> {
    RULES.iter().map(|rule| rule.name)
}

/// Classify a message. Returns `None` for messages the bot must ignore:
/// anything not addressed to it, and addressed messages with nothing to act on.
pub fn classify(message: &InboundMessage) -> Option<Disposition> {
    if !message.addressed {
        return None;
    }

    let disposition = RULES.iter().find_map(|rule| (rule.apply)(message));

    if let Some(disposition) = &disposition {
        tracing::debug!(
            message_id = %message.id,
            disposition = disposition.kind(),
            "message classified"
        );
    }

    disposition
}

fn pdf_rule(message: &InboundMessage) -> Option<Disposition> {
    message
        .attachments
        .iter()
        .find(|attachment| attachment.is_pdf())
        .map(|attachment| Disposition::Pdf {
            attachment: attachment.clone(),
        })
}

fn image_upload_rule(message: &InboundMessage) -> Option<Disposition> {
    message
        .attachments
        .iter()
        .find(|attachment| attachment.is_image())
        .map(|attachment| Disposition::ImageUpload {
            attachment: attachment.clone(),
        })
}

fn image_generation_rule(message: &InboundMessage) -> Option<Disposition> {
    let text = message.text.trim();
    is_image_generation_request(text).then(|| Disposition::ImageGeneration {
        prompt: text.to_string(),
    })
}

fn text_rule(message: &InboundMessage) -> Option<Disposition> {
    let text = message.text.trim();
    if text.is_empty() {
        return None;
    }

    let length = if is_simple_question(text) {
        ResponseLength::Short
    } else {
        ResponseLength::Long
    };

    Some(Disposition::Text {
        text: text.to_string(),
        length,
    })
}

/// An action verb (generate, create, draw) at the start followed by a
/// subject noun (image, picture, art).
pub fn is_image_generation_request(text: &str) -> bool {
    IMAGE_GENERATION_PATTERN.is_match(text.trim())
}

/// Short or simple questions get a brief answer.
pub fn is_simple_question(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    let word_count = text.split_whitespace().count();

    if word_count < 8 {
        return true;
    }

    if SIMPLE_QUESTION_PREFIXES
        .iter()
        .any(|prefix| text.starts_with(prefix))
    {
        return true;
    }

    word_count <= 5 && text.ends_with('?')
}
