//! Fixed texts: system prompts, generator instructions and user notices.

use kudachat_config::IdentityConfig;
use kudachat_core::NamedPersona;

/// Sent in place of an empty user turn.
pub const CLARIFICATION_REQUEST: &str =
    "I couldn't find a question. Could you clarify your request?";

/// Answer used when the model returned no extractable text.
pub const NO_CONTENT: &str = "(no content)";

/// Shown when the completion API call fails.
pub const COMPLETION_FAILED: &str =
    "Unable to get an answer right now. Please try again later.";

/// The system message opening every conversation request.
pub fn system_prompt(identity: &IdentityConfig, persona: &NamedPersona) -> String {
    format!(
        "You are {bot}, a Discord bot created by {creator}. Stay concise, natural and empathetic. \
         Current persona: {name}. Behaviour: {description}. Global context: {directive} \
         Answer in Markdown and avoid overly long messages.",
        bot = identity.bot_name,
        creator = identity.creator,
        name = persona.name,
        description = persona.persona.description,
        directive = identity.global_directive,
    )
}

/// Notice for an image turn the active model cannot read.
pub fn unsupported_image_notice(model: &str, image_capable: &[String]) -> String {
    let supported = if image_capable.is_empty() {
        "none configured".to_string()
    } else {
        image_capable.join(", ")
    };
    format!(
        "The model **{model}** does not support image input. \
         Send your message without images, or ask the bot owner to switch to an \
         image-capable model with /model set ({supported})."
    )
}

/// System instruction for persona auto-generation.
pub fn generator_instruction(identity: &IdentityConfig) -> String {
    [
        format!("You generate Discord personas for {}.", identity.bot_name),
        "Follow the intent of the request closely.".to_string(),
        r#"Reply only with valid JSON strictly matching {"name": string, "description": string}."#
            .to_string(),
        "The name must be short (3-30 characters), without emoji, and easy to reuse as an identifier."
            .to_string(),
        "The description must be concise (2-4 sentences) and describe tone and behaviour."
            .to_string(),
    ]
    .join(" ")
}

/// User message carrying the idea to turn into a persona.
pub fn generator_request(idea: &str) -> String {
    format!(
        "Create a persona from this user request: {idea}. \
         Make sure the persona strictly follows the described wishes."
    )
}
