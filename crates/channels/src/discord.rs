//! Discord channel adapter.
//!
//! Outbound traffic uses the Discord REST API directly: channel messages,
//! deferred interaction callbacks and edits of the original interaction
//! response. Inbound events are not read from the Discord gateway; a relay
//! forwards them through the HTTP ingress, which calls [`DiscordChannel::inject_event`].

use async_trait::async_trait;
use kudachat_core::channel::{Channel, ChannelEvent, ChannelId, CommandInvocation};
use kudachat_core::error::ChannelError;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Interaction callback type: deferred channel message with source.
const DEFERRED_CHANNEL_MESSAGE: u8 = 5;
/// Message flag: only the invoking user sees the answer.
const EPHEMERAL_FLAG: u32 = 1 << 6;

/// Discord channel configuration.
#[derive(Clone)]
pub struct DiscordConfig {
    /// Bot token from Discord Developer Portal.
    pub bot_token: String,
    /// Application (client) ID, needed to edit interaction responses.
    pub application_id: String,
    /// REST base URL, e.g. `https://discord.com/api/v10`.
    pub api_url: String,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &"[REDACTED]")
            .field("application_id", &self.application_id)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Discord channel adapter.
pub struct DiscordChannel {
    config: DiscordConfig,
    channel_id: ChannelId,
    client: reqwest::Client,
    inject_tx: tokio::sync::Mutex<Option<mpsc::Sender<Result<ChannelEvent, ChannelError>>>>,
}

impl DiscordChannel {
    pub fn new(config: DiscordConfig) -> Self {
        let config = DiscordConfig {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            ..config
        };
        Self {
            config,
            channel_id: ChannelId("discord".into()),
            client: reqwest::Client::new(),
            inject_tx: tokio::sync::Mutex::new(None),
        }
    }

    /// Inject an event as if it came from Discord (called by the ingress).
    pub async fn inject_event(&self, event: ChannelEvent) -> Result<(), ChannelError> {
        // The lock is released before a possibly blocking send.
        let tx = self.inject_tx.lock().await.clone();
        let Some(tx) = tx else {
            return Err(ChannelError::ConnectionLost("Channel not started".into()));
        };
        tx.send(Ok(event))
            .await
            .map_err(|_| ChannelError::ConnectionLost("Event channel closed".into()))
    }

    /// Whether `start` has been called and `stop` has not.
    pub async fn is_started(&self) -> bool {
        self.inject_tx.lock().await.is_some()
    }

    /// Overwrite the application's global slash commands.
    pub async fn register_commands(
        &self,
        definitions: &[serde_json::Value],
    ) -> Result<(), ChannelError> {
        info!(count = definitions.len(), "Registering slash commands");
        let path = format!("/applications/{}/commands", self.config.application_id);
        let request = self
            .authorized(self.client.put(self.url(&path)))
            .json(definitions);
        self.execute(request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url, path)
    }

    /// Send a request and turn any non-success status into a delivery error.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<(), ChannelError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.delivery_failed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %body, "Discord rejected request");
        Err(self.delivery_failed(format!("HTTP {}: {}", status.as_u16(), body)))
    }

    fn delivery_failed(&self, reason: String) -> ChannelError {
        ChannelError::DeliveryFailed {
            channel: "discord".into(),
            reason,
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("Bot {}", self.config.bot_token))
    }
}

#[derive(Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_reference: Option<MessageReference<'a>>,
    allowed_mentions: AllowedMentions,
}

#[derive(Serialize)]
struct MessageReference<'a> {
    message_id: &'a str,
}

/// Replies never ping anyone.
#[derive(Serialize)]
struct AllowedMentions {
    parse: [&'static str; 0],
    replied_user: bool,
}

impl Default for AllowedMentions {
    fn default() -> Self {
        Self {
            parse: [],
            replied_user: false,
        }
    }
}

#[derive(Serialize)]
struct InteractionCallback {
    #[serde(rename = "type")]
    kind: u8,
    data: CallbackData,
}

#[derive(Serialize)]
struct CallbackData {
    #[serde(skip_serializing_if = "Option::is_none")]
    flags: Option<u32>,
}

#[derive(Serialize)]
struct EditMessage<'a> {
    content: &'a str,
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelEvent, ChannelError>>, ChannelError> {
        info!(api_url = %self.config.api_url, "Discord channel starting");
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        debug!(
            chat_id = %chat_id,
            reply_to = ?reply_to,
            content_len = content.len(),
            "Discord send"
        );
        let body = CreateMessage {
            content,
            message_reference: reply_to.map(|message_id| MessageReference { message_id }),
            allowed_mentions: AllowedMentions::default(),
        };
        let request = self
            .authorized(self.client.post(self.url(&format!("/channels/{chat_id}/messages"))))
            .json(&body);
        self.execute(request).await
    }

    async fn acknowledge(
        &self,
        command: &CommandInvocation,
        ephemeral: bool,
    ) -> Result<(), ChannelError> {
        debug!(interaction = %command.interaction_id, ephemeral, "Deferring interaction");
        let body = InteractionCallback {
            kind: DEFERRED_CHANNEL_MESSAGE,
            data: CallbackData {
                flags: ephemeral.then_some(EPHEMERAL_FLAG),
            },
        };
        let path = format!(
            "/interactions/{}/{}/callback",
            command.interaction_id, command.token
        );
        self.execute(self.client.post(self.url(&path)).json(&body))
            .await
    }

    async fn respond(
        &self,
        command: &CommandInvocation,
        content: &str,
    ) -> Result<(), ChannelError> {
        let path = format!(
            "/webhooks/{}/{}/messages/@original",
            self.config.application_id, command.token
        );
        self.execute(
            self.client
                .patch(self.url(&path))
                .json(&EditMessage { content }),
        )
        .await
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError> {
        let request =
            self.authorized(self.client.post(self.url(&format!("/channels/{chat_id}/typing"))));
        self.execute(request).await
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Discord channel stopping");
        *self.inject_tx.lock().await = None;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        Ok(!self.config.bot_token.is_empty())
    }
}
