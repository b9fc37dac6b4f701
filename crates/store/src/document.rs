//! The persisted document and its pure mutations.
//!
//! ```json
//! { "personas": { "<community>": { "<name>": "legacy" | { "description": "...", "parameters": {} } } },
//!   "currentPersona": { "<community>": "<name>" },
//!   "usage": { "<community>": 42 },
//!   "model": "gpt-4o-mini" }
//! ```

use std::collections::BTreeMap;

use indexmap::IndexMap;
use kudachat_core::{NamedPersona, Persona, PersonaError};
use serde::{Deserialize, Serialize};

/// Persona name every community always has.
pub const DEFAULT_PERSONA: &str = "default";

/// A community's personas, in document order.
pub type PersonaMap = IndexMap<String, Persona>;

/// The whole persisted state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub personas: BTreeMap<String, PersonaMap>,

    #[serde(default, rename = "currentPersona")]
    pub current_persona: BTreeMap<String, String>,

    #[serde(default)]
    pub usage: BTreeMap<String, u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl StoreDocument {
    /// The document written when no durable medium exists yet.
    pub fn seed(model: &str) -> Self {
        Self {
            model: Some(model.to_string()),
            ..Self::default()
        }
    }

    /// Persona map of a community, with `default` seeded if missing.
    pub fn seeded_personas(
        &mut self,
        community: &str,
        default_description: &str,
    ) -> &mut PersonaMap {
        let personas = self.personas.entry(community.to_string()).or_default();
        if !personas.contains_key(DEFAULT_PERSONA) {
            personas.insert(DEFAULT_PERSONA.to_string(), Persona::new(default_description));
        }
        personas
    }

    /// Insert or replace a persona. `default` is seeded first so it keeps
    /// its place at the head of a new community's personas.
    pub fn upsert_persona(
        &mut self,
        community: &str,
        name: &str,
        persona: Persona,
        default_description: &str,
    ) {
        self.seeded_personas(community, default_description)
            .insert(name.to_string(), persona);
    }

    /// Remove a persona, moving the active pointer if it pointed at it.
    ///
    /// The fallback is the first remaining persona in document order, else
    /// `default`, which is re-seeded when it no longer exists.
    pub fn remove_persona(
        &mut self,
        community: &str,
        name: &str,
        default_description: &str,
    ) -> Result<(), PersonaError> {
        let personas = self.seeded_personas(community, default_description);
        if personas.shift_remove(name).is_none() {
            return Err(PersonaError::NotFound { name: name.to_string() });
        }
        let fallback = personas
            .keys()
            .next()
            .cloned()
            .unwrap_or_else(|| DEFAULT_PERSONA.to_string());

        if self.current_persona.get(community).map(String::as_str) == Some(name) {
            if fallback == DEFAULT_PERSONA {
                self.seeded_personas(community, default_description);
            }
            self.current_persona.insert(community.to_string(), fallback);
        }
        Ok(())
    }

    pub fn activate(
        &mut self,
        community: &str,
        name: &str,
        default_description: &str,
    ) -> Result<(), PersonaError> {
        if !self
            .seeded_personas(community, default_description)
            .contains_key(name)
        {
            return Err(PersonaError::NotFound { name: name.to_string() });
        }
        self.current_persona
            .insert(community.to_string(), name.to_string());
        Ok(())
    }

    /// The active persona: the stored pointer if it resolves, else the
    /// first persona in document order.
    pub fn active_persona(&mut self, community: &str, default_description: &str) -> NamedPersona {
        let pointer = self.current_persona.get(community).cloned();
        let personas = self.seeded_personas(community, default_description);

        let resolved = pointer
            .and_then(|name| personas.get(&name).map(|p| (name, p.clone())))
            .or_else(|| {
                personas
                    .iter()
                    .next()
                    .map(|(name, p)| (name.clone(), p.clone()))
            });

        match resolved {
            Some((name, persona)) => NamedPersona { name, persona },
            // Unreachable after seeding.
            None => NamedPersona {
                name: DEFAULT_PERSONA.to_string(),
                persona: Persona::new(default_description),
            },
        }
    }

    pub fn add_usage(&mut self, community: &str, tokens: u64) {
        let counter = self.usage.entry(community.to_string()).or_insert(0);
        *counter = counter.saturating_add(tokens);
    }

    pub fn usage_of(&self, community: &str) -> u64 {
        self.usage.get(community).copied().unwrap_or(0)
    }
}
