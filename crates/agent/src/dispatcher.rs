//! Event dispatcher: routes channel events to the orchestrator or the
//! command layer, one task per event.

use std::sync::{Arc, LazyLock};

use kudachat_core::channel::{Channel, ChannelEvent, ChannelMessage, CommandInvocation};
use kudachat_core::error::ChannelError;
use regex_lite::Regex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::commands::{Command, CommandHandler};
use crate::orchestrator::{CompletionOrchestrator, InboundTurn};
use crate::prompts;
use crate::state::BotState;

static MENTION: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<@!?\d+>").ok());

/// Remove user mentions and surrounding whitespace.
pub fn clean_content(text: &str) -> String {
    match MENTION.as_ref() {
        Some(re) => re.replace_all(text, "").trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Whether an ordinary message should be answered: posted by a human in a
/// community, and either mentioning the bot or replying to it.
pub fn should_respond(message: &ChannelMessage, bot_user_id: &str) -> bool {
    if message.sender_is_bot || message.guild_id.is_none() {
        return false;
    }
    message.mentions.iter().any(|m| m == bot_user_id)
        || message.reply_to_author_id.as_deref() == Some(bot_user_id)
}

pub struct Dispatcher {
    state: Arc<BotState>,
    channel: Arc<dyn Channel>,
    bot_user_id: String,
}

impl Dispatcher {
    pub fn new(state: Arc<BotState>, channel: Arc<dyn Channel>, bot_user_id: impl Into<String>) -> Self {
        Self {
            state,
            channel,
            bot_user_id: bot_user_id.into(),
        }
    }

    /// Consume events until the channel closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<Result<ChannelEvent, ChannelError>>) {
        info!(channel = %self.channel.name(), "Dispatcher started");
        while let Some(event) = events.recv().await {
            match event {
                Ok(event) => {
                    let this = Arc::clone(&self);
                    tokio::spawn(async move { this.handle_event(event).await });
                }
                Err(e) => warn!(error = %e, "Channel reported an error"),
            }
        }
        info!(channel = %self.channel.name(), "Dispatcher stopped");
    }

    pub async fn handle_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Message(message) => self.handle_message(message).await,
            ChannelEvent::Command(command) => self.handle_command(command).await,
        }
    }

    async fn handle_message(&self, message: ChannelMessage) {
        if !should_respond(&message, &self.bot_user_id) {
            debug!(message_id = %message.message_id, "Ignoring message");
            return;
        }
        let Some(community) = message.guild_id.clone() else {
            return;
        };

        if let Err(e) = self.channel.send_typing(&message.chat_id).await {
            debug!(error = %e, "Typing indicator failed");
        }

        let turn = InboundTurn {
            community,
            channel: message.chat_id.clone(),
            text: clean_content(&message.content),
            attachments: message.attachments.clone(),
        };

        let replies = match CompletionOrchestrator::new(self.state.clone())
            .respond(turn)
            .await
        {
            Ok(outcome) => outcome.messages(),
            Err(e) => {
                error!(message_id = %message.message_id, error = %e, "Failed to answer message");
                vec![prompts::COMPLETION_FAILED.to_string()]
            }
        };

        for (index, chunk) in replies.iter().enumerate() {
            let reply_to = (index == 0).then_some(message.message_id.as_str());
            if let Err(e) = self.channel.send(&message.chat_id, chunk, reply_to).await {
                error!(chat_id = %message.chat_id, error = %e, "Failed to deliver reply");
                break;
            }
        }
    }

    async fn handle_command(&self, invocation: CommandInvocation) {
        let parsed = Command::parse(&invocation);
        let ephemeral = parsed.as_ref().map_or(true, Command::is_ephemeral);

        if let Err(e) = self.channel.acknowledge(&invocation, ephemeral).await {
            error!(interaction = %invocation.interaction_id, error = %e, "Failed to acknowledge command");
            return;
        }

        let content = match parsed {
            Ok(command) => {
                CommandHandler::new(self.state.clone())
                    .execute(&invocation, command)
                    .await
                    .content
            }
            Err(e) => {
                warn!(command = %invocation.name, error = %e, "Rejected command");
                e.to_string()
            }
        };

        if let Err(e) = self.channel.respond(&invocation, &content).await {
            error!(interaction = %invocation.interaction_id, error = %e, "Failed to answer command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BotSettings;
    use crate::test_helpers::*;
    use kudachat_core::error::ProviderError;
    use kudachat_store::ContextKey;

    const BOT: &str = "1000";

    fn message(content: &str) -> ChannelMessage {
        ChannelMessage {
            message_id: "m1".into(),
            guild_id: Some("G".into()),
            chat_id: "C".into(),
            sender_id: "42".into(),
            sender_name: Some("alice".into()),
            sender_is_bot: false,
            content: content.into(),
            mentions: vec![BOT.into()],
            reply_to_message_id: None,
            reply_to_author_id: None,
            attachments: vec![],
        }
    }

    fn command(name: &str, sub: Option<&str>, options: serde_json::Value) -> CommandInvocation {
        CommandInvocation {
            interaction_id: "i1".into(),
            token: "tok".into(),
            name: name.into(),
            subcommand: sub.map(String::from),
            options: options.as_object().cloned().unwrap_or_default(),
            guild_id: Some("G".into()),
            chat_id: "C".into(),
            user_id: "42".into(),
        }
    }

    #[test]
    fn mentions_are_stripped() {
        assert_eq!(clean_content("<@1000> Bonjour"), "Bonjour");
        assert_eq!(clean_content("hey <@!1000>, and <@77> too"), "hey , and  too");
        assert_eq!(clean_content("  <@1000>  "), "");
        assert_eq!(clean_content("<@&55> role"), "<@&55> role");
    }

    #[test]
    fn trigger_rules() {
        assert!(should_respond(&message("hi"), BOT));

        let mut bot_author = message("hi");
        bot_author.sender_is_bot = true;
        assert!(!should_respond(&bot_author, BOT));

        let mut dm = message("hi");
        dm.guild_id = None;
        assert!(!should_respond(&dm, BOT));

        let mut unrelated = message("hi");
        unrelated.mentions.clear();
        assert!(!should_respond(&unrelated, BOT));

        let mut reply = unrelated.clone();
        reply.reply_to_message_id = Some("m0".into());
        reply.reply_to_author_id = Some(BOT.into());
        assert!(should_respond(&reply, BOT));
    }

    #[tokio::test]
    async fn mention_is_answered_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::answering("abcdefghij", 10));
        let settings = BotSettings {
            reply_chunk_chars: 4,
            ..BotSettings::default()
        };
        let state = test_state_with(&dir, provider.clone(), settings).await;
        let channel = Arc::new(RecordingChannel::new());
        let dispatcher = Dispatcher::new(state.clone(), channel.clone(), BOT);

        dispatcher
            .handle_event(ChannelEvent::Message(message("<@1000> Bonjour")))
            .await;

        assert_eq!(channel.sent_texts(), vec!["abcd", "efgh", "ij"]);
        let request = &provider.requests()[0];
        assert_eq!(
            request.messages[1].content,
            kudachat_core::MessageContent::Parts(vec![kudachat_core::ContentPart::text("Bonjour")])
        );
        assert_eq!(state.context.len(&ContextKey::new("G", "C")), 2);
    }

    #[tokio::test]
    async fn ignored_message_calls_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let state = test_state(&dir, provider.clone()).await;
        let channel = Arc::new(RecordingChannel::new());
        let dispatcher = Dispatcher::new(state, channel.clone(), BOT);

        let mut msg = message("just chatting");
        msg.mentions.clear();
        dispatcher.handle_event(ChannelEvent::Message(msg)).await;

        assert_eq!(provider.call_count(), 0);
        assert!(channel.deliveries().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_sends_notice() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::ApiError {
            status_code: 500,
            message: "boom".into(),
        })]));
        let state = test_state(&dir, provider).await;
        let channel = Arc::new(RecordingChannel::new());
        let dispatcher = Dispatcher::new(state, channel.clone(), BOT);

        dispatcher
            .handle_event(ChannelEvent::Message(message("<@1000> hi")))
            .await;

        assert_eq!(channel.sent_texts(), vec![prompts::COMPLETION_FAILED]);
    }

    #[tokio::test]
    async fn command_is_acknowledged_then_answered() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir, Arc::new(ScriptedProvider::new(vec![]))).await;
        let channel = Arc::new(RecordingChannel::new());
        let dispatcher = Dispatcher::new(state, channel.clone(), BOT);

        dispatcher
            .handle_event(ChannelEvent::Command(command("clearcontext", None, serde_json::json!({}))))
            .await;

        assert_eq!(
            channel.deliveries(),
            vec![
                Delivery::Acknowledged {
                    interaction_id: "i1".into(),
                    ephemeral: false
                },
                Delivery::Responded {
                    interaction_id: "i1".into(),
                    content: "All context for this channel has been cleared.".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn malformed_command_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir, Arc::new(ScriptedProvider::new(vec![]))).await;
        let channel = Arc::new(RecordingChannel::new());
        let dispatcher = Dispatcher::new(state, channel.clone(), BOT);

        dispatcher
            .handle_event(ChannelEvent::Command(command(
                "persona",
                Some("set"),
                serde_json::json!({}),
            )))
            .await;

        let deliveries = channel.deliveries();
        assert_eq!(
            deliveries[0],
            Delivery::Acknowledged {
                interaction_id: "i1".into(),
                ephemeral: true
            }
        );
        assert_eq!(
            deliveries[1],
            Delivery::Responded {
                interaction_id: "i1".into(),
                content: "Missing option: nom".into()
            }
        );
    }

    #[tokio::test]
    async fn run_spawns_per_event_until_closed() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::answering("ok", 1));
        let state = test_state(&dir, provider.clone()).await;
        let channel = Arc::new(RecordingChannel::new());
        let dispatcher = Arc::new(Dispatcher::new(state, channel.clone(), BOT));

        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(dispatcher.run(rx));
        tx.send(Err(ChannelError::ConnectionLost("blip".into())))
            .await
            .unwrap();
        tx.send(Ok(ChannelEvent::Message(message("<@1000> hi"))))
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        for _ in 0..50 {
            if !channel.sent_texts().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(channel.sent_texts(), vec!["ok"]);
    }
}
