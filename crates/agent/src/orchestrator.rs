//! Completion orchestration: one inbound turn in, one reply out.
//!
//! The orchestrator reads the active persona, the active model and the
//! conversation context, builds the completion request, and on success
//! writes the exchange back to the context cache and the usage counter.
//! A failed completion leaves all state untouched.

use std::sync::Arc;

use kudachat_core::channel::Attachment;
use kudachat_core::message::{ContentPart, Message};
use kudachat_core::provider::{ProviderRequest, ResponseContent};
use kudachat_core::Result;
use kudachat_store::ContextKey;
use tracing::{debug, error, info, warn};

use crate::persona::{resolve_parameters, to_request_map};
use crate::prompts;
use crate::state::BotState;

/// A user message that should be answered.
#[derive(Debug, Clone)]
pub struct InboundTurn {
    pub community: String,
    pub channel: String,
    /// Text with bot mentions already removed
    pub text: String,
    pub attachments: Vec<Attachment>,
}

/// What to tell the user.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    /// The model answered; `chunks` are delivered in order.
    Answered {
        chunks: Vec<String>,
        persona: String,
        model: String,
        usage_tokens: u64,
    },
    /// Image input was sent while the active model cannot read images.
    UnsupportedImageInput { model: String, notice: String },
    /// The completion call failed.
    Failed { notice: String },
}

impl ReplyOutcome {
    /// The messages to deliver, in order.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ReplyOutcome::Answered { chunks, .. } => chunks.clone(),
            ReplyOutcome::UnsupportedImageInput { notice, .. } => vec![notice.clone()],
            ReplyOutcome::Failed { notice } => vec![notice.clone()],
        }
    }
}

/// Answers ordinary messages using the shared bot state.
pub struct CompletionOrchestrator {
    state: Arc<BotState>,
}

impl CompletionOrchestrator {
    pub fn new(state: Arc<BotState>) -> Self {
        Self { state }
    }

    /// Answer one turn.
    ///
    /// Store failures are returned as errors; completion failures become
    /// [`ReplyOutcome::Failed`].
    pub async fn respond(&self, turn: InboundTurn) -> Result<ReplyOutcome> {
        let state = &self.state;
        let settings = &state.settings;
        let key = ContextKey::new(&turn.community, &turn.channel);

        let persona = state.store.active_persona(&turn.community).await?;
        let model = state.store.model().await?;
        let history = state.context.get(&key);

        let mut parts = Vec::new();
        if !turn.text.is_empty() {
            parts.push(ContentPart::text(&turn.text));
        }
        for attachment in &turn.attachments {
            let is_image = attachment
                .mime_type
                .as_deref()
                .is_some_and(|mime| settings.is_image_mime(mime));
            if is_image {
                parts.push(ContentPart::image(&attachment.url));
            }
        }

        if parts.iter().any(ContentPart::is_image) && !settings.supports_images(&model) {
            info!(
                community = %turn.community,
                model = %model,
                "Image input refused for model without image support"
            );
            return Ok(ReplyOutcome::UnsupportedImageInput {
                notice: prompts::unsupported_image_notice(&model, &settings.image_capable_models),
                model,
            });
        }

        if parts.is_empty() {
            parts.push(ContentPart::text(prompts::CLARIFICATION_REQUEST));
        }
        let user_turn = Message::user_parts(parts);

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(prompts::system_prompt(
            &settings.identity,
            &persona,
        )));
        messages.extend(history);
        messages.push(user_turn.clone());

        let parameters = resolve_parameters(&settings.default_parameters, &persona.persona.parameters);
        let request = ProviderRequest {
            model: model.clone(),
            messages,
            parameters: to_request_map(&parameters),
        };

        debug!(
            community = %turn.community,
            channel = %turn.channel,
            persona = %persona.name,
            model = %model,
            messages = request.messages.len(),
            "Requesting completion"
        );

        let response = match state.provider.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    community = %turn.community,
                    channel = %turn.channel,
                    model = %model,
                    error = %e,
                    "Completion failed"
                );
                return Ok(ReplyOutcome::Failed {
                    notice: prompts::COMPLETION_FAILED.to_string(),
                });
            }
        };

        let answer = extract_answer_text(response.content.as_ref());
        let usage_tokens = response
            .usage
            .map(|u| u64::from(u.total_tokens))
            .unwrap_or(0);

        state.context.push(&key, user_turn);
        state.context.push(&key, Message::assistant(&answer));
        state.context.trim(&key, settings.context_limit);

        if let Err(e) = state.store.add_usage(&turn.community, usage_tokens).await {
            warn!(community = %turn.community, error = %e, "Failed to record usage");
        }

        info!(
            community = %turn.community,
            channel = %turn.channel,
            persona = %persona.name,
            tokens = usage_tokens,
            "Answered"
        );

        Ok(ReplyOutcome::Answered {
            chunks: split_chunks(&answer, settings.reply_chunk_chars),
            persona: persona.name,
            model,
            usage_tokens,
        })
    }
}

/// The answer text of a completion.
///
/// Structured content contributes every text and refusal part, in order,
/// joined by newlines. The result is trimmed; nothing usable yields the
/// "no content" placeholder.
pub fn extract_answer_text(content: Option<&ResponseContent>) -> String {
    let text = match content {
        Some(ResponseContent::Text(text)) => text.clone(),
        Some(ResponseContent::Parts(parts)) => parts
            .iter()
            .filter_map(|part| match part.kind.as_str() {
                "text" => part.text.as_deref(),
                "refusal" => part.refusal.as_deref(),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
        None => String::new(),
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        prompts::NO_CONTENT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Split `text` into pieces of at most `limit` characters.
///
/// This is a plain character count: words may be cut, code points never.
pub fn split_chunks(text: &str, limit: usize) -> Vec<String> {
    if text.is_empty() || limit == 0 {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(limit)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
