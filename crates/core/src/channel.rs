//! Channel trait: the abstraction over chat platforms.
//!
//! A Channel connects Kudachat to a messaging platform. It yields inbound
//! events (ordinary messages and structured commands) and delivers replies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;

/// Unique identifier for a channel instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordinary message posted on the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Platform message ID
    pub message_id: String,

    /// Community (server) the message was posted in; `None` for DMs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,

    /// The chat (text channel) identifier
    pub chat_id: String,

    /// Sender identifier (platform-specific user ID)
    pub sender_id: String,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// Whether the author is a bot account
    #[serde(default)]
    pub sender_is_bot: bool,

    /// Raw text content, mentions included
    #[serde(default)]
    pub content: String,

    /// User IDs mentioned in the message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,

    /// The message this one replies to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<String>,

    /// Author of the message being replied to, if resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_author_id: Option<String>,

    /// Attachments (images, files, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// An attachment in a channel message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Type of attachment
    #[serde(default = "default_kind")]
    pub kind: AttachmentKind,

    /// URL or file path
    pub url: String,

    /// Optional filename
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Declared MIME type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// File size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

fn default_kind() -> AttachmentKind {
    AttachmentKind::Other
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Document,
    Audio,
    Video,
    Other,
}

/// A structured command (slash command) invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandInvocation {
    /// Platform interaction ID
    pub interaction_id: String,

    /// Interaction token used to answer
    pub token: String,

    /// Top-level command name (e.g. "persona")
    pub name: String,

    /// Subcommand name (e.g. "create")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcommand: Option<String>,

    /// Named options as supplied by the platform
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,

    /// Community the command was used in; `None` for DMs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,

    /// The chat (text channel) identifier
    pub chat_id: String,

    /// Invoking user
    pub user_id: String,
}

/// Anything a channel can deliver to the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    Message(ChannelMessage),
    Command(CommandInvocation),
}

/// The core Channel trait.
///
/// Implementations handle platform-specific connection logic, message
/// formatting and authentication.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "discord").
    fn name(&self) -> &str;

    /// Unique ID for this channel instance.
    fn id(&self) -> &ChannelId;

    /// Start listening for inbound events.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelEvent, ChannelError>>,
        ChannelError,
    >;

    /// Send a message to a specific chat.
    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> std::result::Result<(), ChannelError>;

    /// Acknowledge a command before running it. The answer visibility is
    /// fixed here.
    async fn acknowledge(
        &self,
        _command: &CommandInvocation,
        _ephemeral: bool,
    ) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Answer an acknowledged command.
    async fn respond(
        &self,
        command: &CommandInvocation,
        content: &str,
    ) -> std::result::Result<(), ChannelError>;

    /// Send a typing indicator (if the platform supports it).
    async fn send_typing(&self, _chat_id: &str) -> std::result::Result<(), ChannelError> {
        Ok(()) // No-op default
    }

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Health check: is the channel connected and operational?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_event_parses_with_defaults() {
        let json = r#"{
            "type": "message",
            "message_id": "m1",
            "guild_id": "g1",
            "chat_id": "c1",
            "sender_id": "u1",
            "content": "<@42> Bonjour",
            "mentions": ["42"]
        }"#;
        let event: ChannelEvent = serde_json::from_str(json).unwrap();
        let ChannelEvent::Message(msg) = event else {
            panic!("expected message");
        };
        assert_eq!(msg.guild_id.as_deref(), Some("g1"));
        assert!(!msg.sender_is_bot);
        assert!(msg.attachments.is_empty());
        assert_eq!(msg.mentions, vec!["42".to_string()]);
    }

    #[test]
    fn command_event_parses() {
        let json = r#"{
            "type": "command",
            "interaction_id": "i1",
            "token": "tok",
            "name": "persona",
            "subcommand": "set",
            "options": {"nom": "pirate"},
            "guild_id": "g1",
            "chat_id": "c1",
            "user_id": "u1"
        }"#;
        let event: ChannelEvent = serde_json::from_str(json).unwrap();
        let ChannelEvent::Command(cmd) = event else {
            panic!("expected command");
        };
        assert_eq!(cmd.subcommand.as_deref(), Some("set"));
        assert_eq!(cmd.options["nom"], "pirate");
    }

    #[test]
    fn attachment_kind_defaults_to_other() {
        let att: Attachment =
            serde_json::from_str(r#"{"url":"https://x/y.png","mime_type":"image/png"}"#).unwrap();
        assert_eq!(att.kind, AttachmentKind::Other);
        assert_eq!(att.mime_type.as_deref(), Some("image/png"));
    }
}
