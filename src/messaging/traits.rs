//! Messaging traits implemented by platform adapters.

use crate::error::Result;
use crate::{Attachment, InboundMessage, StatusUpdate};
use futures::Stream;
use std::pin::Pin;

/// Message stream type.
pub type InboundStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// Static trait for messaging adapters.
pub trait Messaging: Send + Sync + 'static {
    /// Unique name for this adapter.
    fn name(&self) -> &str;

    /// Start the adapter and return inbound message stream.
    fn start(&self) -> impl std::future::Future<Output = Result<InboundStream>> + Send;

    /// Reply to a message. Text above the platform ceiling is rejected with
    /// `MessagingError::ExceedsCeiling` before transmission.
    fn respond(
        &self,
        message: &InboundMessage,
        text: String,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Send a status update.
    fn send_status(
        &self,
        message: &InboundMessage,
        status: StatusUpdate,
    ) -> impl std::future::Future<Output = Result<()>> + Send {
        let _ = (message, status);
        async { Ok(()) }
    }

    /// Verify the platform accepts our credentials.
    fn health_check(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Graceful shutdown.
    fn shutdown(&self) -> impl std::future::Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}

/// Downloads attachment bytes.
pub trait AttachmentSource: Send + Sync {
    fn fetch_attachment(
        &self,
        attachment: &Attachment,
    ) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
}
