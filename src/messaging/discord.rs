//! Discord messaging adapter using serenity.

use crate::agent::format::check_ceiling;
use crate::error::MessagingError;
use crate::messaging::traits::{AttachmentSource, InboundStream, Messaging};
use crate::{Attachment, InboundMessage, StatusUpdate};

use anyhow::Context as _;
use async_trait::async_trait;
use serenity::all::{
    ActivityData, ChannelId, Context, CreateAllowedMentions, CreateMessage, EventHandler,
    GatewayIntents, Http, Message, MessageId, Ready, ShardManager, UserId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};

/// Discord adapter state.
pub struct DiscordAdapter {
    token: String,
    activity: String,
    platform_ceiling: usize,
    download_client: reqwest::Client,
    http: Arc<RwLock<Option<Arc<Http>>>>,
    bot_user_id: Arc<RwLock<Option<UserId>>>,
    /// Typing handles per message. Typing stops when the handle is dropped.
    typing_tasks: Arc<RwLock<HashMap<String, serenity::http::Typing>>>,
    shard_manager: Arc<RwLock<Option<Arc<ShardManager>>>>,
}

impl DiscordAdapter {
    pub fn new(
        token: impl Into<String>,
        activity: impl Into<String>,
        platform_ceiling: usize,
    ) -> Self {
        Self {
            token: token.into(),
            activity: activity.into(),
            platform_ceiling,
            download_client: reqwest::Client::new(),
            http: Arc::new(RwLock::new(None)),
            bot_user_id: Arc::new(RwLock::new(None)),
            typing_tasks: Arc::new(RwLock::new(HashMap::new())),
            shard_manager: Arc::new(RwLock::new(None)),
        }
    }

    async fn get_http(&self) -> crate::Result<Arc<Http>> {
        self.http
            .read()
            .await
            .clone()
            .ok_or_else(|| MessagingError::NotConnected.into())
    }

    fn extract_channel_id(&self, message: &InboundMessage) -> anyhow::Result<ChannelId> {
        let id = message
            .metadata
            .get("discord_channel_id")
            .and_then(|v| v.as_u64())
            .context("missing discord_channel_id in metadata")?;
        Ok(ChannelId::new(id))
    }

    async fn stop_typing(&self, message_id: &str) {
        // Typing stops when the handle is dropped
        self.typing_tasks.write().await.remove(message_id);
    }
}

impl Messaging for DiscordAdapter {
    fn name(&self) -> &str {
        "discord"
    }

    async fn start(&self) -> crate::Result<InboundStream> {
        let (inbound_tx, inbound_rx) = mpsc::channel(256);

        let handler = Handler {
            inbound_tx,
            activity: self.activity.clone(),
            http_slot: self.http.clone(),
            bot_user_id_slot: self.bot_user_id.clone(),
        };

        let intents = GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::GUILDS;

        let mut client = serenity::Client::builder(&self.token, intents)
            .event_handler(handler)
            .await
            .context("failed to build discord client")?;

        *self.http.write().await = Some(client.http.clone());
        *self.shard_manager.write().await = Some(client.shard_manager.clone());

        tokio::spawn(async move {
            if let Err(error) = client.start().await {
                tracing::error!(%error, "discord gateway error");
            }
        });

        let stream = tokio_stream::wrappers::ReceiverStream::new(inbound_rx);
        Ok(Box::pin(stream))
    }

    async fn respond(&self, message: &InboundMessage, text: String) -> crate::Result<()> {
        self.stop_typing(&message.id).await;
        check_ceiling(&text, self.platform_ceiling)?;

        let http = self.get_http().await?;
        let channel_id = self.extract_channel_id(message)?;

        let mut builder = CreateMessage::new()
            .content(text)
            .allowed_mentions(CreateAllowedMentions::new().replied_user(false));

        // Reply to the triggering message when we know which one it was
        if let Some(message_id) = message
            .metadata
            .get("discord_message_id")
            .and_then(|v| v.as_u64())
        {
            builder = builder.reference_message((channel_id, MessageId::new(message_id)));
        }

        channel_id
            .send_message(&*http, builder)
            .await
            .map_err(|error| MessagingError::SendFailed(error.to_string()))?;

        Ok(())
    }

    async fn send_status(
        &self,
        message: &InboundMessage,
        status: StatusUpdate,
    ) -> crate::Result<()> {
        match status {
            StatusUpdate::Thinking => {
                let http = self.get_http().await?;
                let channel_id = self.extract_channel_id(message)?;

                let typing = channel_id.start_typing(&http);
                self.typing_tasks
                    .write()
                    .await
                    .insert(message.id.clone(), typing);
            }
            StatusUpdate::StopTyping => {
                self.stop_typing(&message.id).await;
            }
        }

        Ok(())
    }

    async fn health_check(&self) -> crate::Result<()> {
        let http = self.get_http().await?;
        http.get_current_user()
            .await
            .context("discord health check failed")?;
        Ok(())
    }

    async fn shutdown(&self) -> crate::Result<()> {
        self.typing_tasks.write().await.clear();

        if let Some(shard_manager) = self.shard_manager.read().await.as_ref() {
            shard_manager.shutdown_all().await;
        }

        tracing::info!("discord adapter shut down");
        Ok(())
    }
}

impl AttachmentSource for DiscordAdapter {
    async fn fetch_attachment(&self, attachment: &Attachment) -> crate::Result<Vec<u8>> {
        let download_error = |reason: String| MessagingError::Download {
            filename: attachment.filename.clone(),
            reason,
        };

        let response = self
            .download_client
            .get(&attachment.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|error| download_error(error.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|error| download_error(error.to_string()))?;

        tracing::info!(
            filename = %attachment.filename,
            size = bytes.len(),
            "downloaded attachment"
        );

        Ok(bytes.to_vec())
    }
}

// -- Serenity EventHandler --

struct Handler {
    inbound_tx: mpsc::Sender<InboundMessage>,
    activity: String,
    http_slot: Arc<RwLock<Option<Arc<Http>>>>,
    bot_user_id_slot: Arc<RwLock<Option<UserId>>>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!(
            bot_name = %ready.user.name,
            bot_id = %ready.user.id,
            "discord connected"
        );

        *self.http_slot.write().await = Some(ctx.http.clone());
        *self.bot_user_id_slot.write().await = Some(ready.user.id);

        ctx.set_activity(Some(ActivityData::custom(self.activity.clone())));
        tracing::info!(guild_count = ready.guilds.len(), activity = %self.activity, "discord ready");
    }

    async fn message(&self, _ctx: Context, message: Message) {
        let Some(bot_user_id) = *self.bot_user_id_slot.read().await else {
            return;
        };

        // Always ignore our own messages to prevent self-response loops
        if message.author.id == bot_user_id || message.author.bot {
            return;
        }

        let mentioned = message.mentions_user_id(bot_user_id);
        let replied_to_bot = message
            .referenced_message
            .as_ref()
            .is_some_and(|referenced| referenced.author.id == bot_user_id);

        let inbound = InboundMessage {
            id: message.id.to_string(),
            sender_id: message.author.id.to_string(),
            channel_id: message.channel_id.to_string(),
            text: extract_text(&message, bot_user_id),
            attachments: extract_attachments(&message),
            addressed: mentioned || replied_to_bot,
            timestamp: *message.timestamp,
            metadata: build_metadata(&message),
        };

        if let Err(error) = self.inbound_tx.send(inbound).await {
            tracing::warn!(
                %error,
                "failed to send inbound message from Discord (receiver dropped)"
            );
        }
    }
}

// -- Helper functions --

/// Message text with every mention of the bot removed and other user
/// mentions rendered as `@name`.
fn extract_text(message: &Message, bot_user_id: UserId) -> String {
    let mut text = replace_mention(&message.content, bot_user_id, "");
    for user in message.mentions.iter().filter(|user| user.id != bot_user_id) {
        let name = user.global_name.as_deref().unwrap_or(&user.name);
        text = replace_mention(&text, user.id, &format!("@{name}"));
    }
    text.trim().to_string()
}

/// Replace both `<@id>` and the legacy `<@!id>` form.
fn replace_mention(content: &str, user_id: UserId, replacement: &str) -> String {
    content
        .replace(&format!("<@{user_id}>"), replacement)
        .replace(&format!("<@!{user_id}>"), replacement)
}

fn extract_attachments(message: &Message) -> Vec<Attachment> {
    message
        .attachments
        .iter()
        .map(|attachment| Attachment {
            filename: attachment.filename.clone(),
            url: attachment.url.clone(),
        })
        .collect()
}

/// Ids `respond` and `send_status` need to address the reply.
fn build_metadata(message: &Message) -> HashMap<String, serde_json::Value> {
    HashMap::from([
        ("discord_channel_id".into(), message.channel_id.get().into()),
        ("discord_message_id".into(), message.id.get().into()),
    ])
}
