//! Persona domain types.
//!
//! A persona is a named behavioural profile: a free-text description used in
//! the system prompt plus optional generation parameters. Personas are scoped
//! to a community (Discord server).

use serde::{Deserialize, Deserializer, Serialize};

/// Generation parameters a persona may override.
///
/// Field names are the stable, human-facing names that are persisted. The
/// request layer decides how each one is spelled on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,

    /// Maximum output tokens
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_max_tokens"
    )]
    pub max_tokens: Option<u32>,
}

/// Read `max_tokens` from any JSON value. Fractions are truncated and values
/// past `u32::MAX` are clamped; anything that is not a positive number is
/// treated as unset.
fn lenient_max_tokens<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_f64)
        .filter(|n| n.is_finite() && *n >= 1.0)
        .map(|n| n.min(f64::from(u32::MAX)) as u32))
}

impl GenerationParameters {
    /// Whether no parameter is set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Overlay `other` on top of `self`: every value set in `other` wins.
    pub fn overlay(&self, other: &GenerationParameters) -> GenerationParameters {
        GenerationParameters {
            temperature: other.temperature.or(self.temperature),
            top_p: other.top_p.or(self.top_p),
            presence_penalty: other.presence_penalty.or(self.presence_penalty),
            frequency_penalty: other.frequency_penalty.or(self.frequency_penalty),
            max_tokens: other.max_tokens.or(self.max_tokens),
        }
    }
}

/// A persona as used everywhere past the store boundary.
///
/// Deserialization accepts the legacy shape where the persona is a bare
/// description string; serialization always writes the structured form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredPersona")]
pub struct Persona {
    pub description: String,

    #[serde(default, skip_serializing_if = "GenerationParameters::is_empty")]
    pub parameters: GenerationParameters,
}

impl Persona {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            parameters: GenerationParameters::default(),
        }
    }

    pub fn with_parameters(mut self, parameters: GenerationParameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// On-disk persona shapes, current and legacy.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredPersona {
    Structured {
        description: String,
        #[serde(default)]
        parameters: GenerationParameters,
    },
    Legacy(String),
}

impl From<StoredPersona> for Persona {
    fn from(stored: StoredPersona) -> Self {
        match stored {
            StoredPersona::Structured {
                description,
                parameters,
            } => Persona {
                description,
                parameters,
            },
            StoredPersona::Legacy(description) => Persona::new(description),
        }
    }
}

/// A persona together with its name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedPersona {
    pub name: String,
    pub persona: Persona,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_string_persona_is_normalized() {
        let persona: Persona = serde_json::from_str(r#""Be a pirate.""#).unwrap();
        assert_eq!(persona.description, "Be a pirate.");
        assert!(persona.parameters.is_empty());
    }

    #[test]
    fn structured_persona_keeps_parameters() {
        let persona: Persona = serde_json::from_str(
            r#"{"description":"Calm","parameters":{"temperature":0.2,"max_tokens":120,"top_p":null}}"#,
        )
        .unwrap();
        assert_eq!(persona.parameters.temperature, Some(0.2));
        assert_eq!(persona.parameters.max_tokens, Some(120));
        assert_eq!(persona.parameters.top_p, None);
    }

    #[test]
    fn unknown_parameter_keys_are_ignored() {
        let persona: Persona = serde_json::from_str(
            r#"{"description":"x","parameters":{"seed":4,"temperature":1.0}}"#,
        )
        .unwrap();
        assert_eq!(persona.parameters.temperature, Some(1.0));
    }

    #[test]
    fn odd_max_tokens_values_do_not_break_parsing() {
        let parse = |raw: &str| -> Option<u32> {
            let json = format!(r#"{{"description":"x","parameters":{{"max_tokens":{raw}}}}}"#);
            serde_json::from_str::<Persona>(&json)
                .unwrap()
                .parameters
                .max_tokens
        };
        assert_eq!(parse("200.0"), Some(200));
        assert_eq!(parse("199.9"), Some(199));
        assert_eq!(parse("1e12"), Some(u32::MAX));
        assert_eq!(parse("-1"), None);
        assert_eq!(parse("0"), None);
        assert_eq!(parse(r#""lots""#), None);
        assert_eq!(parse("null"), None);
    }

    #[test]
    fn legacy_persona_is_written_back_structured() {
        let persona: Persona = serde_json::from_str(r#""Old style""#).unwrap();
        let json = serde_json::to_value(&persona).unwrap();
        assert_eq!(json, serde_json::json!({ "description": "Old style" }));
    }

    #[test]
    fn overlay_prefers_persona_values() {
        let defaults = GenerationParameters {
            max_tokens: Some(500),
            ..Default::default()
        };
        let persona = GenerationParameters {
            temperature: Some(1.3),
            max_tokens: Some(200),
            ..Default::default()
        };
        let merged = defaults.overlay(&persona);
        assert_eq!(merged.max_tokens, Some(200));
        assert_eq!(merged.temperature, Some(1.3));
        assert_eq!(merged.top_p, None);
    }
}
