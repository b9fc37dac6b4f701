//! Configuration loading, validation, and management for Kudachat.
//!
//! Loads configuration from `~/.kudachat/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.kudachat/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Discord user ID allowed to run operator commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,

    /// Where the persona/usage document is persisted
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Discord connection settings
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Completion API settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Model allow-lists
    #[serde(default)]
    pub models: ModelsConfig,

    /// Conversation and reply settings
    #[serde(default)]
    pub chat: ChatConfig,

    /// Bot identity used in system prompts
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Usage dashboard settings
    #[serde(default)]
    pub usage: UsageConfig,

    /// HTTP ingress settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data").join("persona-data.json")
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Application ID; also the bot's user ID for mention detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,

    #[serde(default = "default_discord_api_url")]
    pub api_url: String,
}

fn default_discord_api_url() -> String {
    "https://discord.com/api/v10".into()
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            application_id: None,
            api_url: default_discord_api_url(),
        }
    }
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("application_id", &self.application_id)
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model used until an operator picks another one
    #[serde(default = "default_model")]
    pub default: String,

    /// Models an operator may activate
    #[serde(default = "default_allowed_models")]
    pub allowed: Vec<String>,

    /// Models that accept image input
    #[serde(default = "default_image_models")]
    pub image_capable: Vec<String>,

    /// Models probed by the access benchmark
    #[serde(default = "default_benchmark_models")]
    pub benchmark: Vec<String>,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_allowed_models() -> Vec<String> {
    vec!["gpt-4o-mini".into(), "gpt-4o".into(), "o1-mini".into()]
}
fn default_image_models() -> Vec<String> {
    vec!["gpt-4o-mini".into(), "gpt-4o".into()]
}
fn default_benchmark_models() -> Vec<String> {
    vec![
        "gpt-4o-mini".into(),
        "gpt-4o".into(),
        "o1-mini".into(),
        "o3-mini".into(),
        "gpt-4.1".into(),
        "gpt-4.1-mini".into(),
    ]
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default: default_model(),
            allowed: default_allowed_models(),
            image_capable: default_image_models(),
            benchmark: default_benchmark_models(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Number of turns kept per channel
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,

    /// Maximum characters per delivered message
    #[serde(default = "default_reply_chunk_chars")]
    pub reply_chunk_chars: usize,

    /// Max output tokens unless the persona says otherwise
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Attachment MIME types forwarded as images
    #[serde(default = "default_image_mime_types")]
    pub image_mime_types: Vec<String>,
}

fn default_context_limit() -> usize {
    15
}
fn default_reply_chunk_chars() -> usize {
    2000
}
fn default_max_tokens() -> u32 {
    500
}
fn default_image_mime_types() -> Vec<String> {
    ["image/png", "image/jpeg", "image/jpg", "image/webp", "image/gif"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            context_limit: default_context_limit(),
            reply_chunk_chars: default_reply_chunk_chars(),
            default_max_tokens: default_max_tokens(),
            image_mime_types: default_image_mime_types(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    #[serde(default = "default_creator")]
    pub creator: String,

    /// Directive appended to every persona
    #[serde(default = "default_global_directive")]
    pub global_directive: String,
}

fn default_bot_name() -> String {
    "Kudachat".into()
}
fn default_creator() -> String {
    "kudasai_".into()
}
fn default_global_directive() -> String {
    "Fully embody the active persona in every interaction you receive.".into()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            creator: default_creator(),
            global_directive: default_global_directive(),
        }
    }
}

impl IdentityConfig {
    /// Description seeded for every community's `default` persona.
    pub fn default_persona_description(&self) -> String {
        format!(
            "You are {}, a helpful Discord bot created by {}. Stay polite and clear.",
            self.bot_name, self.creator
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageConfig {
    /// Blended price used for the dashboard estimate
    #[serde(default = "default_cost_per_token")]
    pub cost_per_token_usd: f64,
}

fn default_cost_per_token() -> f64 {
    0.000_000_3
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            cost_per_token_usd: default_cost_per_token(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// HMAC secret inbound events must be signed with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_secret: Option<String>,
}

fn default_port() -> u16 {
    42618
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_port(),
            host: default_host(),
            shared_secret: None,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("enabled", &self.enabled)
            .field("port", &self.port)
            .field("host", &self.host)
            .field("shared_secret", &redact(&self.shared_secret))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.kudachat/config.toml).
    ///
    /// Environment variables override the file:
    /// - `DISCORD_TOKEN`, `DISCORD_CLIENT_ID`
    /// - `OPENAI_API_KEY`, `KUDACHAT_API_URL`
    /// - `KUDACHAT_OWNER_ID`, `KUDACHAT_DATA_PATH`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(token) = var("DISCORD_TOKEN") {
            self.discord.bot_token = Some(token);
        }
        if let Some(app_id) = var("DISCORD_CLIENT_ID") {
            self.discord.application_id = Some(app_id);
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(url) = var("KUDACHAT_API_URL") {
            self.provider.api_url = url;
        }
        if let Some(owner) = var("KUDACHAT_OWNER_ID") {
            self.owner_id = Some(owner);
        }
        if let Some(path) = var("KUDACHAT_DATA_PATH") {
            self.data_path = PathBuf::from(path);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".kudachat")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.models.allowed.contains(&self.models.default) {
            return Err(ConfigError::ValidationError(format!(
                "models.default '{}' is not in models.allowed",
                self.models.default
            )));
        }

        if self.chat.context_limit == 0 {
            return Err(ConfigError::ValidationError(
                "chat.context_limit must be > 0".into(),
            ));
        }

        if self.chat.reply_chunk_chars == 0 {
            return Err(ConfigError::ValidationError(
                "chat.reply_chunk_chars must be > 0".into(),
            ));
        }

        if self.usage.cost_per_token_usd < 0.0 {
            return Err(ConfigError::ValidationError(
                "usage.cost_per_token_usd must be >= 0".into(),
            ));
        }

        Ok(())
    }

    /// Whether the Discord credentials needed to run the bot are present.
    pub fn has_discord_credentials(&self) -> bool {
        self.discord.bot_token.is_some() && self.discord.application_id.is_some()
    }

    /// Whether a completion API key is available.
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            owner_id: None,
            data_path: default_data_path(),
            discord: DiscordConfig::default(),
            provider: ProviderConfig::default(),
            models: ModelsConfig::default(),
            chat: ChatConfig::default(),
            identity: IdentityConfig::default(),
            usage: UsageConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
