//! Channel: the per-message pipeline from inbound event to reply.

use crate::agent::classifier::{self, Disposition, ResponseLength};
use crate::agent::format;
use crate::config::{
    Config, FeaturesConfig, ImageGenerationMode, ImageUploadMode, LimitsConfig, LlmConfig,
};
use crate::conversation::{HistoryStore, Role};
use crate::document::{self, PdfLimits};
use crate::error::{MessagingError, Result};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::messaging::{AttachmentSource, InboundStream, Messaging};
use crate::{Attachment, ConversationKey, InboundMessage, StatusUpdate};

use futures::StreamExt as _;
use std::future::Future;

/// Handles inbound messages one at a time and owns the conversation history.
pub struct Channel<M> {
    model: M,
    history: HistoryStore,
    llm: LlmConfig,
    limits: LimitsConfig,
    features: FeaturesConfig,
}

impl<M: LanguageModel> Channel<M> {
    pub fn new(config: &Config, model: M) -> Self {
        Self {
            model,
            history: HistoryStore::new(config.limits.max_history_chars),
            llm: config.llm.clone(),
            limits: config.limits,
            features: config.features,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Handle inbound messages one at a time until `shutdown` resolves. An
    /// inbound stream that ends first means the platform connection is gone
    /// and is reported as `MessagingError::Disconnected`.
    pub async fn run<P>(
        &mut self,
        platform: &P,
        mut inbound: InboundStream,
        shutdown: impl Future,
    ) -> Result<()>
    where
        P: Messaging + AttachmentSource,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                message = inbound.next() => {
                    let Some(message) = message else {
                        tracing::error!(platform = platform.name(), "inbound stream ended");
                        return Err(MessagingError::Disconnected.into());
                    };
                    if let Err(error) = self.handle_message(platform, &message).await {
                        tracing::error!(%error, message_id = %message.id, "failed to deliver reply");
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("shutdown signal received");
                    return Ok(());
                }
            }
        }
    }

    /// Classify, answer and deliver one message. Messages not addressed to the
    /// bot are dropped without side effects.
    pub async fn handle_message<P>(&mut self, platform: &P, message: &InboundMessage) -> Result<()>
    where
        P: Messaging + AttachmentSource,
    {
        let Some(disposition) = classifier::classify(message) else {
            return Ok(());
        };

        tracing::info!(
            message_id = %message.id,
            conversation = %message.conversation_key(),
            disposition = disposition.kind(),
            "handling message"
        );

        if let Err(error) = platform.send_status(message, StatusUpdate::Thinking).await {
            tracing::debug!(%error, "failed to start typing indicator");
        }

        let reply = self.respond_to(disposition, message, platform).await;
        let result = deliver(platform, message, &reply, &self.limits).await;

        if let Err(error) = platform.send_status(message, StatusUpdate::StopTyping).await {
            tracing::debug!(%error, "failed to stop typing indicator");
        }

        let elapsed = chrono::Utc::now() - message.timestamp;
        tracing::debug!(
            message_id = %message.id,
            latency_ms = elapsed.num_milliseconds(),
            delivered = result.is_ok(),
            "message handled"
        );

        result
    }

    /// Produce the reply text for a classified message, already cut to the
    /// reply limit. Every failure becomes a user-facing error message.
    pub async fn respond_to(
        &mut self,
        disposition: Disposition,
        message: &InboundMessage,
        attachments: &impl AttachmentSource,
    ) -> String {
        let key = message.conversation_key();

        let reply = match disposition {
            Disposition::ImageUpload { attachment } => {
                tracing::debug!(filename = %attachment.filename, "image upload answered with fixed reply");
                match self.features.image_uploads {
                    ImageUploadMode::Unsupported => format::IMAGE_UPLOAD_UNSUPPORTED.to_string(),
                    ImageUploadMode::Acknowledge => format::IMAGE_UPLOAD_ACKNOWLEDGED.to_string(),
                }
            }
            Disposition::ImageGeneration { prompt } => self.generate_image(&key, prompt).await,
            Disposition::Pdf { attachment } => self.answer_pdf(&key, &attachment, attachments).await,
            Disposition::Text { text, length } => self.answer_text(&key, text, length).await,
        };

        format::truncate_reply(&reply, self.limits.max_reply_chars)
    }

    async fn generate_image(&mut self, key: &ConversationKey, prompt: String) -> String {
        let reply = match self.features.image_generation {
            ImageGenerationMode::Disabled => format::IMAGE_GENERATION_UNSUPPORTED.to_string(),
            ImageGenerationMode::Enabled => match self.model.generate_image(&prompt).await {
                Ok(url) => url,
                Err(error) => {
                    tracing::error!(%error, conversation = %key, "image generation failed");
                    return format::llm_error_reply(&error);
                }
            },
        };

        self.history.append(key, Role::User, prompt);
        self.history.append(key, Role::Assistant, reply.clone());
        reply
    }

    async fn answer_pdf(
        &mut self,
        key: &ConversationKey,
        attachment: &Attachment,
        attachments: &impl AttachmentSource,
    ) -> String {
        let bytes = match attachments.fetch_attachment(attachment).await {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::error!(%error, filename = %attachment.filename, "attachment download failed");
                return format::generic_error_reply(&error);
            }
        };

        let limits = PdfLimits::from(&self.limits);
        let extracted =
            tokio::task::spawn_blocking(move || document::extract_pdf_text(&bytes, limits)).await;

        let text = match extracted {
            Ok(Ok(text)) => text,
            Ok(Err(error)) => {
                tracing::error!(%error, filename = %attachment.filename, "PDF error");
                return format::pdf_error_reply(&error);
            }
            Err(error) => {
                tracing::error!(%error, filename = %attachment.filename, "pdf extraction task failed");
                return format::generic_error_reply(&error);
            }
        };

        tracing::info!(
            filename = %attachment.filename,
            chars = text.chars().count(),
            "extracted pdf text"
        );

        let length = if classifier::is_simple_question(&text) {
            ResponseLength::Short
        } else {
            ResponseLength::Long
        };

        self.answer_text(key, text, length).await
    }

    async fn answer_text(
        &mut self,
        key: &ConversationKey,
        text: String,
        length: ResponseLength,
    ) -> String {
        self.history.append(key, Role::User, text);

        let (system, max_tokens) = format::generation_hint(length, &self.llm);
        let request = CompletionRequest {
            system: system.to_string(),
            history: self.history.turns(key).cloned().collect(),
            max_tokens,
            temperature: self.llm.temperature,
        };

        match self.model.complete(request).await {
            Ok(reply) => {
                self.history.append(key, Role::Assistant, reply.clone());
                reply
            }
            Err(error) => {
                tracing::error!(%error, conversation = %key, "Grok API error");
                format::llm_error_reply(&error)
            }
        }
    }
}

/// Send a reply. A failed send is logged and retried once with the text cut
/// to the reply limit. Replies from `respond_to` are already within that
/// limit, so for them the retry resends the same text.
pub async fn deliver(
    platform: &impl Messaging,
    message: &InboundMessage,
    text: &str,
    limits: &LimitsConfig,
) -> Result<()> {
    match platform.respond(message, text.to_string()).await {
        Ok(()) => Ok(()),
        Err(error) => {
            tracing::warn!(%error, message_id = %message.id, "send failed, retrying");
            let truncated = format::truncate_reply(text, limits.max_reply_chars);
            platform.respond(message, truncated).await
        }
    }
}
