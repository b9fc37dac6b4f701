//! Slash-command parsing and execution.
//!
//! Every command produces a plain-text reply. Failures are turned into
//! user-facing text here; details only go to the log.

use std::sync::Arc;

use kudachat_core::channel::CommandInvocation;
use kudachat_core::error::{PersonaError, ProviderError};
use kudachat_core::{Error, GenerationParameters};
use kudachat_store::ContextKey;
use serde_json::{Map, Value, json};
use tracing::{error, info, warn};

use crate::generator::PersonaGenerator;
use crate::persona::format_parameters;
use crate::state::BotState;

/// A parsed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Personas,
    PersonaCreate {
        name: String,
        description: String,
        parameters: GenerationParameters,
    },
    PersonaSet {
        name: String,
    },
    PersonaDelete {
        name: String,
    },
    PersonaAutoCreate {
        idea: String,
    },
    ClearContext,
    Dashboard,
    ModelSet {
        model: String,
    },
    Benchmark,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command: /{0}")]
    Unknown(String),

    #[error("Missing option: {0}")]
    MissingOption(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    InvalidOption { name: &'static str, reason: String },
}

/// Text answer of a command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    pub content: String,
}

impl CommandReply {
    fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

const OUTSIDE_COMMUNITY: &str = "This command can only be used inside a server.";
const GENERIC_FAILURE: &str =
    "An error occurred while processing the command. Please try again.";
const GENERATION_FAILURE: &str =
    "Unable to generate the persona right now. Please try again.";

impl Command {
    /// Parse a platform invocation.
    pub fn parse(invocation: &CommandInvocation) -> Result<Self, CommandError> {
        let opts = &invocation.options;
        let sub = invocation.subcommand.as_deref();

        match (invocation.name.as_str(), sub) {
            ("help", _) => Ok(Command::Help),
            ("personas", _) => Ok(Command::Personas),
            ("persona", Some("create")) => Ok(Command::PersonaCreate {
                name: required_string(opts, "nom")?,
                description: required_string(opts, "description")?,
                parameters: GenerationParameters {
                    temperature: optional_number(opts, "temperature")?,
                    top_p: optional_number(opts, "top_p")?,
                    presence_penalty: optional_number(opts, "presence_penalty")?,
                    frequency_penalty: optional_number(opts, "frequency_penalty")?,
                    max_tokens: optional_u32(opts, "max_tokens")?,
                },
            }),
            ("persona", Some("set")) => Ok(Command::PersonaSet {
                name: required_string(opts, "nom")?,
            }),
            ("persona", Some("delete")) => Ok(Command::PersonaDelete {
                name: required_string(opts, "nom")?,
            }),
            ("persona", Some("autocreate")) => Ok(Command::PersonaAutoCreate {
                idea: required_string(opts, "idee")?,
            }),
            ("clearcontext", _) => Ok(Command::ClearContext),
            ("dashboard", _) => Ok(Command::Dashboard),
            ("model", Some("set")) => Ok(Command::ModelSet {
                model: required_string(opts, "nom")?,
            }),
            ("benchmark", _) => Ok(Command::Benchmark),
            (name, Some(sub)) => Err(CommandError::Unknown(format!("{name} {sub}"))),
            (name, None) => Err(CommandError::Unknown(name.to_string())),
        }
    }

    /// Whether only the invoking user should see the answer.
    pub fn is_ephemeral(&self) -> bool {
        !matches!(
            self,
            Command::PersonaSet { .. } | Command::ClearContext | Command::ModelSet { .. }
        )
    }

    fn needs_community(&self) -> bool {
        !matches!(
            self,
            Command::Help | Command::ModelSet { .. } | Command::Benchmark
        )
    }
}

fn required_string(opts: &Map<String, Value>, name: &'static str) -> Result<String, CommandError> {
    match opts.get(name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) | None | Some(Value::Null) => Err(CommandError::MissingOption(name)),
        Some(other) => Err(CommandError::InvalidOption {
            name,
            reason: format!("expected text, got {other}"),
        }),
    }
}

fn optional_number(opts: &Map<String, Value>, name: &'static str) -> Result<Option<f64>, CommandError> {
    match opts.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(other) => Err(CommandError::InvalidOption {
            name,
            reason: format!("expected a number, got {other}"),
        }),
    }
}

fn optional_u32(opts: &Map<String, Value>, name: &'static str) -> Result<Option<u32>, CommandError> {
    match opts.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| CommandError::InvalidOption {
                name,
                reason: format!("expected a positive integer, got {n}"),
            }),
        Some(other) => Err(CommandError::InvalidOption {
            name,
            reason: format!("expected an integer, got {other}"),
        }),
    }
}

/// Runs parsed commands against the shared state.
pub struct CommandHandler {
    state: Arc<BotState>,
}

impl CommandHandler {
    pub fn new(state: Arc<BotState>) -> Self {
        Self { state }
    }

    /// Execute `command` on behalf of `invocation`'s user.
    pub async fn execute(&self, invocation: &CommandInvocation, command: Command) -> CommandReply {
        let community = match (command.needs_community(), invocation.guild_id.as_deref()) {
            (true, None) => return CommandReply::new(OUTSIDE_COMMUNITY),
            (_, community) => community.unwrap_or_default(),
        };

        info!(
            command = %invocation.name,
            subcommand = ?invocation.subcommand,
            community,
            user = %invocation.user_id,
            "Executing command"
        );

        match self.run(invocation, community, command).await {
            Ok(reply) => reply,
            Err(Error::Persona(e @ PersonaError::NotFound { .. })) => CommandReply::new(e.to_string()),
            Err(Error::Persona(PersonaError::EmptyName)) => {
                CommandReply::new(PersonaError::EmptyName.to_string())
            }
            Err(Error::Persona(PersonaError::Generation(reason))) => {
                warn!(community, reason = %reason, "Persona generation failed");
                CommandReply::new(GENERATION_FAILURE)
            }
            Err(e) => {
                error!(command = %invocation.name, error = %e, "Command failed");
                CommandReply::new(GENERIC_FAILURE)
            }
        }
    }

    async fn run(
        &self,
        invocation: &CommandInvocation,
        community: &str,
        command: Command,
    ) -> kudachat_core::Result<CommandReply> {
        let state = &self.state;
        let settings = &state.settings;

        let reply = match command {
            Command::Help => CommandReply::new(help_text()),

            Command::Personas => {
                let personas = state.store.personas(community).await?;
                let active = state.store.active_persona(community).await?.name;
                let lines: Vec<String> = personas
                    .iter()
                    .map(|(name, persona)| {
                        let marker = if *name == active { "(active) " } else { "" };
                        let params = format_parameters(&persona.parameters);
                        let suffix = if params.is_empty() {
                            String::new()
                        } else {
                            format!(" [{params}]")
                        };
                        format!("{marker}{name} : {}{suffix}", persona.description)
                    })
                    .collect();
                if lines.is_empty() {
                    CommandReply::new("No persona defined")
                } else {
                    CommandReply::new(lines.join("\n"))
                }
            }

            Command::PersonaCreate {
                name,
                description,
                parameters,
            } => {
                state
                    .store
                    .create_persona(community, &name, &description, parameters)
                    .await?;
                CommandReply::new(format!("Persona **{name}** has been added."))
            }

            Command::PersonaSet { name } => {
                state.store.set_active_persona(community, &name).await?;
                let personas = state.store.personas(community).await?;
                let list = personas
                    .keys()
                    .map(|p| {
                        if *p == name {
                            format!("(active) {p}")
                        } else {
                            p.clone()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                CommandReply::new(format!(
                    "The active persona is now **{name}**. Available personas: {list}"
                ))
            }

            Command::PersonaDelete { name } => {
                state.store.delete_persona(community, &name).await?;
                let personas = state.store.personas(community).await?;
                let list = personas.keys().cloned().collect::<Vec<_>>().join(", ");
                let list = if list.is_empty() { "none".to_string() } else { list };
                CommandReply::new(format!(
                    "Persona **{name}** has been deleted. Remaining personas: {list}"
                ))
            }

            Command::PersonaAutoCreate { idea } => {
                let generated = PersonaGenerator::new(state.clone())
                    .auto_create(community, &idea)
                    .await?;
                CommandReply::new(format!(
                    "Persona generated and activated: **{}**\nDescription: {}",
                    generated.name, generated.description
                ))
            }

            Command::ClearContext => {
                state
                    .context
                    .clear(&ContextKey::new(community, &invocation.chat_id));
                CommandReply::new("All context for this channel has been cleared.")
            }

            Command::Dashboard => {
                let tokens = state.store.usage(community).await?;
                let cost = tokens as f64 * settings.cost_per_token_usd;
                let model = state.store.model().await?;
                CommandReply::new(
                    [
                        "Usage dashboard:".to_string(),
                        format!("Tokens used: {tokens}"),
                        format!("Estimated cost: ${cost:.4}"),
                        format!("Current model: {model}"),
                    ]
                    .join("\n"),
                )
            }

            Command::ModelSet { model } => {
                if !settings.is_owner(&invocation.user_id) {
                    CommandReply::new("Only the bot owner can change the model")
                } else if !settings.allowed_models.contains(&model) {
                    CommandReply::new(format!("Model **{model}** is not allowed."))
                } else {
                    state.store.set_model(&model).await?;
                    CommandReply::new(format!("The active OpenAI model is now **{model}**."))
                }
            }

            Command::Benchmark => {
                if !settings.is_owner(&invocation.user_id) {
                    CommandReply::new("Only the bot owner can run the model benchmark")
                } else {
                    CommandReply::new(self.benchmark().await)
                }
            }
        };
        Ok(reply)
    }

    /// Probe every benchmark model and summarise which are accessible.
    pub async fn benchmark(&self) -> String {
        let models = &self.state.settings.benchmark_models;
        let mut accessible = Vec::new();
        let mut rejected = Vec::new();

        for model in models {
            match self.state.provider.retrieve_model(model).await {
                Ok(()) => accessible.push(model.clone()),
                Err(e) => rejected.push(format!("{model} ({})", refusal_reason(&e))),
            }
        }

        let or_none = |items: &[String], sep: &str| {
            if items.is_empty() {
                "none".to_string()
            } else {
                items.join(sep)
            }
        };
        [
            format!("Benchmark finished for {} models:", models.len()),
            format!(
                "Accessible ({}): {}.",
                accessible.len(),
                or_none(&accessible, ", ")
            ),
            format!(
                "Inaccessible ({}): {}.",
                rejected.len(),
                or_none(&rejected, "; ")
            ),
        ]
        .join("\n")
    }
}

fn refusal_reason(error: &ProviderError) -> String {
    match error {
        ProviderError::ModelNotFound(message) | ProviderError::AuthenticationFailed(message) => {
            message.clone()
        }
        ProviderError::ApiError { message, .. } if !message.is_empty() => message.clone(),
        other => other.to_string(),
    }
}

fn help_text() -> String {
    [
        "Kudachat help: available commands",
        "• /help: show this help",
        "• /personas: list personas (admin)",
        "• /persona create: create a new persona (admin)",
        "• /persona autocreate: generate a persona automatically (admin)",
        "• /persona set: activate an existing persona (admin)",
        "• /persona delete: delete a persona (admin)",
        "• /clearcontext: clear this channel's context (admin)",
        "• /dashboard: show the usage estimate (admin)",
        "• /model set: change the model (owner only)",
        "• /benchmark: test model access with the API key (owner only)",
    ]
    .join("\n")
}

/// Slash-command definitions as registered with Discord.
pub fn command_definitions(allowed_models: &[String]) -> Vec<Value> {
    const STRING: u8 = 3;
    const INTEGER: u8 = 4;
    const NUMBER: u8 = 10;
    const SUB_COMMAND: u8 = 1;
    // Manage Guild
    const ADMIN: &str = "32";

    let option = |kind: u8, name: &str, description: &str, required: bool| {
        json!({ "type": kind, "name": name, "description": description, "required": required })
    };
    let model_choices: Vec<Value> = allowed_models
        .iter()
        .map(|m| json!({ "name": m, "value": m }))
        .collect();

    vec![
        json!({ "name": "help", "description": "Show Kudachat help" }),
        json!({
            "name": "personas",
            "description": "List the personas of this server",
            "default_member_permissions": ADMIN,
        }),
        json!({
            "name": "persona",
            "description": "Manage personas",
            "default_member_permissions": ADMIN,
            "options": [
                {
                    "type": SUB_COMMAND, "name": "create", "description": "Create a new persona",
                    "options": [
                        option(STRING, "nom", "Unique persona name", true),
                        option(STRING, "description", "Persona description and behaviour", true),
                        option(NUMBER, "temperature", "Creativity (0-2). Optional.", false),
                        option(NUMBER, "top_p", "Probability mass sampled (0-1). Optional.", false),
                        option(NUMBER, "presence_penalty", "Encourages new topics. Optional.", false),
                        option(NUMBER, "frequency_penalty", "Penalises repeated words. Optional.", false),
                        option(INTEGER, "max_tokens", "Maximum answer length. Optional.", false),
                    ],
                },
                {
                    "type": SUB_COMMAND, "name": "set", "description": "Activate an existing persona",
                    "options": [option(STRING, "nom", "Persona to activate", true)],
                },
                {
                    "type": SUB_COMMAND, "name": "delete", "description": "Delete a persona",
                    "options": [option(STRING, "nom", "Persona to delete", true)],
                },
                {
                    "type": SUB_COMMAND, "name": "autocreate", "description": "Generate a persona automatically",
                    "options": [option(STRING, "idee", "Describe the persona you want", true)],
                },
            ],
        }),
        json!({
            "name": "clearcontext",
            "description": "Clear this channel's context",
            "default_member_permissions": ADMIN,
        }),
        json!({
            "name": "dashboard",
            "description": "Show the API usage estimate",
            "default_member_permissions": ADMIN,
        }),
        json!({
            "name": "model",
            "description": "Change the OpenAI model (owner only)",
            "default_member_permissions": ADMIN,
            "options": [{
                "type": SUB_COMMAND, "name": "set", "description": "Set the model to use",
                "options": [{
                    "type": STRING, "name": "nom", "description": "Model from the allowed list",
                    "required": true, "choices": model_choices,
                }],
            }],
        }),
        json!({
            "name": "benchmark",
            "description": "Test which models the API key can access (owner only)",
            "default_member_permissions": ADMIN,
        }),
    ]
}
