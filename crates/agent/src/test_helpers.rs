//! Shared test helpers: a scripted provider, a recording channel and a
//! state builder over a temporary store.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use kudachat_core::channel::{Channel, ChannelEvent, ChannelId, CommandInvocation};
use kudachat_core::error::{ChannelError, ProviderError};
use kudachat_core::provider::{
    Provider, ProviderRequest, ProviderResponse, ResponseContent, Usage,
};
use kudachat_store::{ConfigStore, StoreSeed};
use tokio::sync::mpsc;

use crate::state::{BotSettings, BotState};

/// A provider returning scripted results in order and recording requests.
///
/// Panics if more completions are requested than were scripted.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    inaccessible: Vec<String>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            inaccessible: Vec::new(),
        }
    }

    /// A provider answering once with `text`.
    pub fn answering(text: &str, total_tokens: u32) -> Self {
        Self::new(vec![Ok(text_response(text, total_tokens))])
    }

    /// A provider whose model probes fail for `models`.
    pub fn with_inaccessible(mut self, models: &[&str]) -> Self {
        self.inaccessible = models.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedProvider: no more responses")
    }

    async fn retrieve_model(&self, model: &str) -> Result<(), ProviderError> {
        if self.inaccessible.iter().any(|m| m == model) {
            Err(ProviderError::ModelNotFound(format!(
                "The model `{model}` does not exist or you do not have access to it."
            )))
        } else {
            Ok(())
        }
    }
}

pub fn text_response(text: &str, total_tokens: u32) -> ProviderResponse {
    ProviderResponse {
        content: Some(ResponseContent::Text(text.into())),
        usage: Some(Usage {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens,
        }),
        model: "gpt-4o-mini".into(),
    }
}

/// State over a fresh store in `dir`, with default settings.
pub async fn test_state(dir: &tempfile::TempDir, provider: Arc<dyn Provider>) -> Arc<BotState> {
    test_state_with(dir, provider, BotSettings::default()).await
}

pub async fn test_state_with(
    dir: &tempfile::TempDir,
    provider: Arc<dyn Provider>,
    settings: BotSettings,
) -> Arc<BotState> {
    let seed = StoreSeed {
        model: "gpt-4o-mini".into(),
        default_persona_description: "You are Kudachat.".into(),
    };
    let store = ConfigStore::open(dir.path().join("persona-data.json"), seed)
        .await
        .unwrap();
    Arc::new(BotState::new(store, provider, settings))
}

/// Something a channel was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Sent { chat_id: String, content: String },
    Acknowledged { interaction_id: String, ephemeral: bool },
    Responded { interaction_id: String, content: String },
}

/// A channel that records every outbound call.
pub struct RecordingChannel {
    deliveries: Mutex<Vec<Delivery>>,
    id: ChannelId,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            id: ChannelId("recording".into()),
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Sent { content, .. } => Some(content),
                _ => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelEvent, ChannelError>>, ChannelError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        _reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        self.deliveries.lock().unwrap().push(Delivery::Sent {
            chat_id: chat_id.into(),
            content: content.into(),
        });
        Ok(())
    }

    async fn acknowledge(
        &self,
        command: &CommandInvocation,
        ephemeral: bool,
    ) -> Result<(), ChannelError> {
        self.deliveries.lock().unwrap().push(Delivery::Acknowledged {
            interaction_id: command.interaction_id.clone(),
            ephemeral,
        });
        Ok(())
    }

    async fn respond(
        &self,
        command: &CommandInvocation,
        content: &str,
    ) -> Result<(), ChannelError> {
        self.deliveries.lock().unwrap().push(Delivery::Responded {
            interaction_id: command.interaction_id.clone(),
            content: content.into(),
        });
        Ok(())
    }
}
