//! Reply text: system prompts, fixed messages and length enforcement.

use crate::agent::classifier::ResponseLength;
use crate::config::LlmConfig;
use crate::error::MessagingError;

pub const SHORT_SYSTEM_PROMPT: &str =
    "Provide a very brief, direct answer (1-2 sentences, max 200 characters). Use plain language.";
pub const LONG_SYSTEM_PROMPT: &str = "Answer concisely, under 1800 chars. Focus on main points.";

pub const IMAGE_GENERATION_UNSUPPORTED: &str = "Image generation is not supported.";
pub const IMAGE_UPLOAD_UNSUPPORTED: &str = "Image handling is not supported.";
pub const IMAGE_UPLOAD_ACKNOWLEDGED: &str = "Image uploaded, but image analysis is not supported.";

/// System prompt and token budget for a length band.
pub fn generation_hint(length: ResponseLength, llm: &LlmConfig) -> (&'static str, u32) {
    match length {
        ResponseLength::Short => (SHORT_SYSTEM_PROMPT, llm.short_response_tokens),
        ResponseLength::Long => (LONG_SYSTEM_PROMPT, llm.max_response_tokens),
    }
}

/// Keep the first `max_chars` characters of `text`.
pub fn truncate_reply(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Refuse text the platform would reject outright.
pub fn check_ceiling(text: &str, ceiling: usize) -> Result<(), MessagingError> {
    let length = text.chars().count();
    if length > ceiling {
        return Err(MessagingError::ExceedsCeiling { length, ceiling });
    }
    Ok(())
}

pub fn llm_error_reply(error: &impl std::fmt::Display) -> String {
    format!("[Grok Error] {error}")
}

pub fn pdf_error_reply(error: &impl std::fmt::Display) -> String {
    format!("[PDF Error] {error}")
}

pub fn generic_error_reply(error: &impl std::fmt::Display) -> String {
    format!("[Error] {error}")
}
