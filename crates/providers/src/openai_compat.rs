//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI and any endpoint exposing the same
//! `/chat/completions` and `/models/{id}` surface.
//!
//! Supports:
//! - Chat completions (non-streaming), with multi-part image input
//! - Model retrieval, used to probe model access
//! - Health checks

use async_trait::async_trait;
use kudachat_core::error::ProviderError;
use kudachat_core::message::{Message, MessageContent};
use kudachat_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An OpenAI-compatible chat-completion provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect()
    }

    /// Build the request body: model, messages, then the wire parameters.
    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert("model".into(), serde_json::json!(request.model));
        body.insert(
            "messages".into(),
            serde_json::json!(Self::to_api_messages(&request.messages)),
        );
        for (key, value) in &request.parameters {
            body.insert(key.clone(), value.clone());
        }
        serde_json::Value::Object(body)
    }

    /// Map a non-success HTTP status to a provider error.
    fn status_error(status: u16, body: &str) -> ProviderError {
        match status {
            429 => ProviderError::RateLimited {
                retry_after_secs: 5,
            },
            401 | 403 => ProviderError::AuthenticationFailed(
                error_message(body)
                    .unwrap_or_else(|| "Invalid API key or insufficient permissions".into()),
            ),
            _ => ProviderError::ApiError {
                status_code: status,
                message: error_message(body).unwrap_or_else(|| body.to_string()),
            },
        }
    }

    fn parse_response(api_response: ApiResponse) -> ProviderResponse {
        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content);

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        ProviderResponse {
            content,
            usage,
            model: api_response.model,
        }
    }
}

/// The `error.message` field of an OpenAI error body, if present.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
        .filter(|m| !m.is_empty())
}

#[async_trait]
impl kudachat_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(Self::status_error(status, &error_body));
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        Ok(Self::parse_response(api_response))
    }

    async fn retrieve_model(&self, model: &str) -> std::result::Result<(), ProviderError> {
        let url = format!("{}/models/{}", self.base_url, model);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            return Ok(());
        }

        let error_body = response.text().await.unwrap_or_default();
        debug!(model, status, "Model retrieval refused");
        if status == 404 {
            return Err(ProviderError::ModelNotFound(
                error_message(&error_body).unwrap_or_else(|| model.to_string()),
            ));
        }
        Err(Self::status_error(status, &error_body))
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a MessageContent,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}
