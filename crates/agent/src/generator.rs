//! Persona auto-generation from a free-text idea.

use std::sync::Arc;

use kudachat_core::error::PersonaError;
use kudachat_core::message::Message;
use kudachat_core::provider::ProviderRequest;
use kudachat_core::{GenerationParameters, Result};
use kudachat_store::PersonaMap;
use serde::Deserialize;
use tracing::{info, warn};

use crate::orchestrator::extract_answer_text;
use crate::persona::to_request_map;
use crate::prompts;
use crate::state::BotState;

const GENERATION_TEMPERATURE: f64 = 0.9;
const GENERATION_MAX_TOKENS: u32 = 350;

/// A persona created by [`PersonaGenerator::auto_create`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPersona {
    /// Final, de-duplicated name
    pub name: String,
    pub description: String,
    pub usage_tokens: u64,
}

#[derive(Deserialize)]
struct GeneratedFields {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

pub struct PersonaGenerator {
    state: Arc<BotState>,
}

impl PersonaGenerator {
    pub fn new(state: Arc<BotState>) -> Self {
        Self { state }
    }

    /// Generate a persona from `idea`, then create and activate it in
    /// `community` and record the call's token usage.
    pub async fn auto_create(&self, community: &str, idea: &str) -> Result<GeneratedPersona> {
        let state = &self.state;
        let model = state.store.model().await?;

        let parameters = GenerationParameters {
            temperature: Some(GENERATION_TEMPERATURE),
            max_tokens: Some(GENERATION_MAX_TOKENS),
            ..Default::default()
        };
        let request = ProviderRequest {
            model,
            messages: vec![
                Message::system(prompts::generator_instruction(&state.settings.identity)),
                Message::user(prompts::generator_request(idea)),
            ],
            parameters: to_request_map(&parameters),
        };

        let response = state
            .provider
            .complete(request)
            .await
            .map_err(|e| PersonaError::Generation(format!("completion failed: {e}")))?;
        let usage_tokens = response
            .usage
            .map(|u| u64::from(u.total_tokens))
            .unwrap_or(0);

        let raw = extract_answer_text(response.content.as_ref());
        let (base_name, description) = parse_generated(&raw).inspect_err(|e| {
            warn!(community, error = %e, response = %raw, "Unusable generated persona");
        })?;

        let existing = state.store.personas(community).await?;
        let name = unique_name(&base_name, &existing);

        state
            .store
            .create_persona(
                community,
                &name,
                &description,
                GenerationParameters::default(),
            )
            .await?;
        state.store.set_active_persona(community, &name).await?;
        state.store.add_usage(community, usage_tokens).await?;

        info!(community, persona = %name, tokens = usage_tokens, "Persona generated");
        Ok(GeneratedPersona {
            name,
            description,
            usage_tokens,
        })
    }
}

/// Parse `{name, description}` out of a model answer.
fn parse_generated(raw: &str) -> std::result::Result<(String, String), PersonaError> {
    let payload = extract_json_object(raw).unwrap_or(raw);
    let fields: GeneratedFields = serde_json::from_str(payload)
        .map_err(|e| PersonaError::Generation(format!("invalid JSON: {e}")))?;

    let name = fields.name.as_deref().map(str::trim).unwrap_or_default();
    let description = fields
        .description
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if name.is_empty() || description.is_empty() {
        return Err(PersonaError::Generation(
            "missing name or description".into(),
        ));
    }
    Ok((name.to_string(), description.to_string()))
}

/// The first balanced `{...}` span of `text`, ignoring braces inside
/// JSON string literals.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// `base`, or `base-1`, `base-2`, ... whichever is free first.
pub fn unique_name(base: &str, existing: &PersonaMap) -> String {
    if !existing.contains_key(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !existing.contains_key(candidate))
        .unwrap_or_else(|| base.to_string())
}
