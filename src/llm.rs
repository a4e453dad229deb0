//! Language-model collaborator: request types, trait seam and the Grok client.

pub mod client;

pub use client::XaiClient;

use crate::conversation::Turn;
use crate::error::LlmError;

/// One chat completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    /// Prior turns followed by the new user turn, oldest first.
    pub history: Vec<Turn>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Text and image generation endpoints.
pub trait LanguageModel: Send + Sync + 'static {
    /// Generate a reply for the conversation in `request`.
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl std::future::Future<Output = Result<String, LlmError>> + Send;

    /// Generate an image and return its URL.
    fn generate_image(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, LlmError>> + Send;
}
