//! Persona parameter resolution.
//!
//! Turns the persisted, human-named generation parameters of a persona into
//! what a completion request carries, and into the short summary shown in
//! persona listings.

use kudachat_core::GenerationParameters;
use serde_json::{Map, Value, json};

/// Effective parameters: `defaults`, overridden key by key by the persona.
pub fn resolve_parameters(
    defaults: &GenerationParameters,
    persona: &GenerationParameters,
) -> GenerationParameters {
    defaults.overlay(persona)
}

/// Wire key/value pairs for a completion request.
///
/// `max_tokens` travels as `max_completion_tokens`; the other keys keep their
/// names. Unset values are omitted.
pub fn to_request_map(parameters: &GenerationParameters) -> Map<String, Value> {
    let mut map = Map::new();
    if let Some(v) = parameters.temperature {
        map.insert("temperature".into(), json!(v));
    }
    if let Some(v) = parameters.top_p {
        map.insert("top_p".into(), json!(v));
    }
    if let Some(v) = parameters.presence_penalty {
        map.insert("presence_penalty".into(), json!(v));
    }
    if let Some(v) = parameters.frequency_penalty {
        map.insert("frequency_penalty".into(), json!(v));
    }
    if let Some(v) = parameters.max_tokens {
        map.insert("max_completion_tokens".into(), json!(v));
    }
    map
}

/// `temp=0.7, top_p=0.9, max_tokens=200`, or an empty string.
pub fn format_parameters(parameters: &GenerationParameters) -> String {
    let labelled: [(&str, Option<String>); 5] = [
        ("temp", parameters.temperature.map(|v| v.to_string())),
        ("top_p", parameters.top_p.map(|v| v.to_string())),
        ("presence_penalty", parameters.presence_penalty.map(|v| v.to_string())),
        ("frequency_penalty", parameters.frequency_penalty.map(|v| v.to_string())),
        ("max_tokens", parameters.max_tokens.map(|v| v.to_string())),
    ];

    labelled
        .into_iter()
        .filter_map(|(label, value)| value.map(|v| format!("{label}={v}")))
        .collect::<Vec<_>>()
        .join(", ")
}
