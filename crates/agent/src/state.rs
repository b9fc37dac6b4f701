//! Process-wide bot state, built once at startup and shared through `Arc`.

use std::sync::Arc;

use kudachat_config::{AppConfig, IdentityConfig};
use kudachat_core::{GenerationParameters, Provider};
use kudachat_store::{ConfigStore, ContextCache, StoreSeed};

/// Behavioural settings derived from the configuration.
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// User allowed to run operator commands; nobody when unset
    pub owner_id: Option<String>,
    pub allowed_models: Vec<String>,
    pub image_capable_models: Vec<String>,
    pub benchmark_models: Vec<String>,
    /// Attachment MIME types forwarded as image input (lower-case)
    pub image_mime_types: Vec<String>,
    pub context_limit: usize,
    pub reply_chunk_chars: usize,
    /// Parameters every persona starts from
    pub default_parameters: GenerationParameters,
    pub cost_per_token_usd: f64,
    pub identity: IdentityConfig,
}

impl BotSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            owner_id: config.owner_id.clone(),
            allowed_models: config.models.allowed.clone(),
            image_capable_models: config.models.image_capable.clone(),
            benchmark_models: config.models.benchmark.clone(),
            image_mime_types: config
                .chat
                .image_mime_types
                .iter()
                .map(|m| m.to_ascii_lowercase())
                .collect(),
            context_limit: config.chat.context_limit,
            reply_chunk_chars: config.chat.reply_chunk_chars,
            default_parameters: GenerationParameters {
                max_tokens: Some(config.chat.default_max_tokens),
                ..Default::default()
            },
            cost_per_token_usd: config.usage.cost_per_token_usd,
            identity: config.identity.clone(),
        }
    }

    /// Seed values for the configuration store.
    pub fn store_seed(config: &AppConfig) -> StoreSeed {
        StoreSeed {
            model: config.models.default.clone(),
            default_persona_description: config.identity.default_persona_description(),
        }
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner_id.as_deref() == Some(user_id)
    }

    pub fn supports_images(&self, model: &str) -> bool {
        self.image_capable_models.iter().any(|m| m == model)
    }

    pub fn is_image_mime(&self, mime: &str) -> bool {
        let mime = mime.to_ascii_lowercase();
        self.image_mime_types.iter().any(|m| *m == mime)
    }
}

impl Default for BotSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Everything a request handler needs.
pub struct BotState {
    pub store: ConfigStore,
    pub context: ContextCache,
    pub provider: Arc<dyn Provider>,
    pub settings: BotSettings,
}

impl BotState {
    pub fn new(store: ConfigStore, provider: Arc<dyn Provider>, settings: BotSettings) -> Self {
        Self {
            store,
            context: ContextCache::new(),
            provider,
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_config() {
        let settings = BotSettings::default();
        assert_eq!(settings.context_limit, 15);
        assert_eq!(settings.default_parameters.max_tokens, Some(500));
        assert!(settings.supports_images("gpt-4o"));
        assert!(!settings.supports_images("o1-mini"));
        assert!(settings.is_image_mime("IMAGE/PNG"));
        assert!(!settings.is_image_mime("application/pdf"));
    }

    #[test]
    fn owner_check() {
        let mut settings = BotSettings::default();
        assert!(!settings.is_owner("800"));
        settings.owner_id = Some("800".into());
        assert!(settings.is_owner("800"));
        assert!(!settings.is_owner("801"));
    }
}
