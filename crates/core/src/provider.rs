//! Provider trait: the abstraction over chat-completion backends.
//!
//! A Provider knows how to send an ordered message sequence to an LLM and
//! get one answer back together with its token usage. It is treated as a
//! black box: any failure is an opaque `ProviderError`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// A completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// System prompt, history and the new turn, in order
    pub messages: Vec<Message>,

    /// Generation parameters, already keyed by their wire names
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

/// One typed part of a structured answer (`text`, `refusal`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePart {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,
}

/// Answer content: a plain string, or a sequence of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseContent {
    Text(String),
    Parts(Vec<ResponsePart>),
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Content of the first choice, if any
    pub content: Option<ResponseContent>,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// The orchestrator and the persona generator call `complete()` without
/// knowing which backend is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Check that the configured key can access `model`.
    async fn retrieve_model(&self, _model: &str) -> std::result::Result<(), ProviderError> {
        Ok(())
    }

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_content_parses() {
        let content: ResponseContent = serde_json::from_str(r#""Salut !""#).unwrap();
        assert_eq!(content, ResponseContent::Text("Salut !".into()));
    }

    #[test]
    fn structured_content_parses() {
        let content: ResponseContent = serde_json::from_str(
            r#"[{"type":"text","text":"a"},{"type":"refusal","refusal":"no"}]"#,
        )
        .unwrap();
        let ResponseContent::Parts(parts) = content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].kind, "refusal");
        assert_eq!(parts[1].refusal.as_deref(), Some("no"));
    }

    #[test]
    fn empty_parameters_are_not_serialized() {
        let req = ProviderRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![],
            parameters: serde_json::Map::new(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("parameters").is_none());
    }
}
