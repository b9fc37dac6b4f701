//! File-backed configuration store: one JSON document, rewritten whole.
//!
//! Every public operation is a full read-modify-write cycle: load the
//! document, apply one logical mutation, write the document back. Writes go
//! to a sibling temporary file that is then renamed over the target, so a
//! crash never leaves a half-written document behind.
//!
//! Storage location: `data/persona-data.json` unless configured otherwise.

use std::path::{Path, PathBuf};

use kudachat_core::error::{PersonaError, StoreError};
use kudachat_core::{GenerationParameters, NamedPersona, Persona, Result};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::document::{PersonaMap, StoreDocument};

/// Values used when the store has to invent state.
#[derive(Debug, Clone)]
pub struct StoreSeed {
    /// Model written into a fresh document
    pub model: String,
    /// Description of every community's `default` persona
    pub default_persona_description: String,
}

/// Durable store for personas, active persona, model and usage.
pub struct ConfigStore {
    path: PathBuf,
    seed: StoreSeed,
    /// Serialises read-modify-write cycles within this process.
    cycle: Mutex<()>,
}

impl ConfigStore {
    /// Open the store, creating the document if needed.
    ///
    /// Fails with [`StoreError::Corrupted`] if the existing document cannot
    /// be parsed; callers treat that as fatal.
    pub async fn open(path: impl Into<PathBuf>, seed: StoreSeed) -> Result<Self> {
        let store = Self {
            path: path.into(),
            seed,
            cycle: Mutex::new(()),
        };
        let doc = store.load().await?;
        info!(
            path = %store.path.display(),
            communities = doc.personas.len(),
            "Configuration store opened"
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All personas of a community in document order. Seeds `default` if
    /// missing.
    pub async fn personas(&self, community: &str) -> Result<PersonaMap> {
        let description = self.seed.default_persona_description.clone();
        self.transact(|doc| Ok(doc.seeded_personas(community, &description).clone()))
            .await
    }

    /// Create or overwrite a persona.
    pub async fn create_persona(
        &self,
        community: &str,
        name: &str,
        description: &str,
        parameters: GenerationParameters,
    ) -> Result<()> {
        if name.trim().is_empty() {
            return Err(PersonaError::EmptyName.into());
        }
        let persona = Persona::new(description).with_parameters(parameters);
        let default_description = self.seed.default_persona_description.clone();
        self.transact(|doc| {
            doc.upsert_persona(community, name, persona, &default_description);
            Ok(())
        })
        .await?;
        info!(community, persona = name, "Persona saved");
        Ok(())
    }

    /// Delete a persona, moving the active pointer if needed.
    pub async fn delete_persona(&self, community: &str, name: &str) -> Result<()> {
        let description = self.seed.default_persona_description.clone();
        self.transact(|doc| Ok(doc.remove_persona(community, name, &description)?))
            .await?;
        info!(community, persona = name, "Persona deleted");
        Ok(())
    }

    /// Make `name` the active persona of a community.
    pub async fn set_active_persona(&self, community: &str, name: &str) -> Result<()> {
        let description = self.seed.default_persona_description.clone();
        self.transact(|doc| Ok(doc.activate(community, name, &description)?))
            .await?;
        info!(community, persona = name, "Active persona changed");
        Ok(())
    }

    /// The active persona of a community.
    pub async fn active_persona(&self, community: &str) -> Result<NamedPersona> {
        let description = self.seed.default_persona_description.clone();
        self.transact(|doc| Ok(doc.active_persona(community, &description)))
            .await
    }

    /// The process-wide active model.
    pub async fn model(&self) -> Result<String> {
        let fallback = self.seed.model.clone();
        self.transact(|doc| Ok(doc.model.clone().unwrap_or(fallback)))
            .await
    }

    /// Replace the active model. The allow-list is checked by the caller.
    pub async fn set_model(&self, model: &str) -> Result<()> {
        self.transact(|doc| {
            doc.model = Some(model.to_string());
            Ok(())
        })
        .await?;
        info!(model, "Active model changed");
        Ok(())
    }

    /// Add tokens to a community's cumulative usage.
    pub async fn add_usage(&self, community: &str, tokens: u64) -> Result<()> {
        self.transact(|doc| {
            doc.add_usage(community, tokens);
            Ok(())
        })
        .await
    }

    /// Cumulative token usage of a community.
    pub async fn usage(&self, community: &str) -> Result<u64> {
        self.transact(|doc| Ok(doc.usage_of(community))).await
    }

    /// Run one read-modify-write cycle. The document is only written back
    /// when `op` changed it.
    async fn transact<T>(
        &self,
        op: impl FnOnce(&mut StoreDocument) -> Result<T>,
    ) -> Result<T> {
        let _guard = self.cycle.lock().await;
        let mut doc = self.load().await?;
        let before = doc.clone();
        let out = op(&mut doc)?;
        if doc != before {
            self.persist(&doc).await?;
        }
        Ok(out)
    }

    /// Read the document, creating it from the seed when absent.
    async fn load(&self) -> Result<StoreDocument> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                StoreError::Corrupted {
                    path: self.path.clone(),
                    reason: e.to_string(),
                }
                .into()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No persisted document, writing seed");
                let doc = StoreDocument::seed(&self.seed.model);
                self.persist(&doc).await?;
                Ok(doc)
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Write the whole document atomically (temp file + rename).
    async fn persist(&self, doc: &StoreDocument) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let content = serde_json::to_string_pretty(doc).map_err(|e| {
            kudachat_core::Error::from(StoreError::Io {
                path: self.path.clone(),
                reason: e.to_string(),
            })
        })?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), "Document persisted");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, e: std::io::Error) -> kudachat_core::Error {
        StoreError::Io {
            path: self.path.clone(),
            reason: e.to_string(),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DEFAULT_PERSONA;
    use kudachat_core::Error;

    fn seed() -> StoreSeed {
        StoreSeed {
            model: "gpt-4o-mini".into(),
            default_persona_description: "You are Kudachat.".into(),
        }
    }

    async fn open_in(dir: &tempfile::TempDir) -> ConfigStore {
        ConfigStore::open(dir.path().join("data").join("persona-data.json"), seed())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn open_creates_seed_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["personas"], serde_json::json!({}));
        assert_eq!(json["currentPersona"], serde_json::json!({}));
        assert_eq!(json["usage"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn corrupted_document_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persona-data.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = ConfigStore::open(&path, seed()).await;
        assert!(matches!(
            result,
            Err(Error::Store(StoreError::Corrupted { .. }))
        ));
        // No auto-repair
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn non_integer_max_tokens_does_not_corrupt_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persona-data.json");
        std::fs::write(
            &path,
            r#"{"personas": {"g": {
                "default": "d",
                "bard": {"description": "sings", "parameters": {"max_tokens": 200.0, "temperature": 0.5}},
                "mute": {"description": "quiet", "parameters": {"max_tokens": -1}}
            }}}"#,
        )
        .unwrap();

        let store = ConfigStore::open(&path, seed()).await.unwrap();
        let personas = store.personas("g").await.unwrap();
        assert_eq!(personas["bard"].parameters.max_tokens, Some(200));
        assert_eq!(personas["bard"].parameters.temperature, Some(0.5));
        assert_eq!(personas["mute"].parameters.max_tokens, None);
    }

    #[tokio::test]
    async fn personas_always_contain_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;

        let personas = store.personas("guild-a").await.unwrap();
        assert!(personas.contains_key(DEFAULT_PERSONA));
        assert_eq!(personas[DEFAULT_PERSONA].description, "You are Kudachat.");
    }

    #[tokio::test]
    async fn seeding_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;

        store.personas("g").await.unwrap();
        let first = std::fs::metadata(store.path()).unwrap().modified().unwrap();
        let first_raw = std::fs::read_to_string(store.path()).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let personas = store.personas("g").await.unwrap();

        assert_eq!(personas.len(), 1);
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), first_raw);
        assert_eq!(
            std::fs::metadata(store.path()).unwrap().modified().unwrap(),
            first
        );
    }

    #[tokio::test]
    async fn create_persona_upserts() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;

        store
            .create_persona("g", "pirate", "Arr", GenerationParameters::default())
            .await
            .unwrap();
        let params = GenerationParameters {
            temperature: Some(1.2),
            ..Default::default()
        };
        store.create_persona("g", "pirate", "Yo-ho", params).await.unwrap();

        let personas = store.personas("g").await.unwrap();
        assert_eq!(personas["pirate"].description, "Yo-ho");
        assert_eq!(personas["pirate"].parameters.temperature, Some(1.2));
    }

    #[tokio::test]
    async fn empty_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;

        let err = store
            .create_persona("g", "  ", "x", GenerationParameters::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Persona(PersonaError::EmptyName)));
    }

    #[tokio::test]
    async fn set_active_unknown_persona_fails_and_keeps_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;
        store
            .create_persona("g", "bard", "sings", GenerationParameters::default())
            .await
            .unwrap();
        store.set_active_persona("g", "bard").await.unwrap();

        let err = store.set_active_persona("g", "nonexistent").await.unwrap_err();
        assert!(matches!(err, Error::Persona(PersonaError::NotFound { .. })));
        assert_eq!(store.active_persona("g").await.unwrap().name, "bard");
    }

    #[tokio::test]
    async fn default_is_a_legal_target_on_empty_community() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;
        store.set_active_persona("fresh", DEFAULT_PERSONA).await.unwrap();
        assert_eq!(store.active_persona("fresh").await.unwrap().name, DEFAULT_PERSONA);
    }

    #[tokio::test]
    async fn delete_active_persona_repoints_to_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;
        store
            .create_persona("g", "pirate", "Arr", GenerationParameters::default())
            .await
            .unwrap();
        store.set_active_persona("g", "pirate").await.unwrap();

        store.delete_persona("g", "pirate").await.unwrap();

        let active = store.active_persona("g").await.unwrap();
        let personas = store.personas("g").await.unwrap();
        assert!(personas.contains_key(&active.name));
        assert!(!personas.contains_key("pirate"));
    }

    #[tokio::test]
    async fn create_does_not_change_effective_active_persona() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;
        assert_eq!(store.active_persona("g").await.unwrap().name, DEFAULT_PERSONA);

        store
            .create_persona("g", "Pirate", "Arr", GenerationParameters::default())
            .await
            .unwrap();
        assert_eq!(store.active_persona("g").await.unwrap().name, DEFAULT_PERSONA);

        store
            .create_persona("unseen", "Bard", "Sings", GenerationParameters::default())
            .await
            .unwrap();
        assert_eq!(store.active_persona("unseen").await.unwrap().name, DEFAULT_PERSONA);
    }

    #[tokio::test]
    async fn delete_active_falls_back_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;
        store.personas("g").await.unwrap();
        for name in ["zed", "Alpha"] {
            store
                .create_persona("g", name, name, GenerationParameters::default())
                .await
                .unwrap();
        }
        store.set_active_persona("g", "zed").await.unwrap();

        store.delete_persona("g", "zed").await.unwrap();

        assert_eq!(store.active_persona("g").await.unwrap().name, DEFAULT_PERSONA);
        let reopened = open_in(&dir).await;
        let names: Vec<_> = reopened.personas("g").await.unwrap().keys().cloned().collect();
        assert_eq!(names, ["default", "Alpha"]);
    }

    #[tokio::test]
    async fn delete_unknown_persona_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;
        let err = store.delete_persona("g", "ghost").await.unwrap_err();
        assert_eq!(err.to_string(), "Persona not found for this server: ghost");
    }

    #[tokio::test]
    async fn active_persona_defaults_to_first_known() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;
        let active = store.active_persona("g").await.unwrap();
        assert_eq!(active.name, DEFAULT_PERSONA);
    }

    #[tokio::test]
    async fn usage_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;

        assert_eq!(store.usage("g").await.unwrap(), 0);
        store.add_usage("g", 5).await.unwrap();
        store.add_usage("g", 7).await.unwrap();
        assert_eq!(store.usage("g").await.unwrap(), 12);
        store.add_usage("g", 0).await.unwrap();
        assert_eq!(store.usage("g").await.unwrap(), 12);
        assert_eq!(store.usage("other").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open_in(&dir).await;
            store.set_model("gpt-4o").await.unwrap();
            store
                .create_persona("g", "pirate", "Arr", GenerationParameters::default())
                .await
                .unwrap();
            store.set_active_persona("g", "pirate").await.unwrap();
            store.add_usage("g", 33).await.unwrap();
        }

        let store = open_in(&dir).await;
        assert_eq!(store.model().await.unwrap(), "gpt-4o");
        let personas = store.personas("g").await.unwrap();
        assert_eq!(personas["pirate"].description, "Arr");
        assert!(personas.contains_key(DEFAULT_PERSONA));
        assert_eq!(store.active_persona("g").await.unwrap().name, "pirate");
        assert_eq!(store.usage("g").await.unwrap(), 33);
    }

    #[tokio::test]
    async fn model_falls_back_to_seed_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persona-data.json");
        std::fs::write(&path, r#"{"personas":{},"currentPersona":{},"usage":{}}"#).unwrap();

        let store = ConfigStore::open(&path, seed()).await.unwrap();
        assert_eq!(store.model().await.unwrap(), "gpt-4o-mini");
    }

    #[tokio::test]
    async fn legacy_personas_are_rewritten_structured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persona-data.json");
        std::fs::write(
            &path,
            r#"{"personas":{"g":{"default":"Old","bard":"Sings"}},"currentPersona":{},"usage":{},"model":"gpt-4o-mini"}"#,
        )
        .unwrap();

        let store = ConfigStore::open(&path, seed()).await.unwrap();
        store.add_usage("g", 1).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["personas"]["g"]["bard"]["description"], "Sings");
    }
}
