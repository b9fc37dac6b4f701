//! Error types for the Kudachat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all Kudachat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Persona errors ---
    #[error(transparent)]
    Persona(#[from] PersonaError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O failed at {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    /// The persisted document exists but cannot be parsed. Never repaired.
    #[error("Persisted document at {path} is corrupted: {reason}")]
    Corrupted { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersonaError {
    #[error("Persona not found for this server: {name}")]
    NotFound { name: String },

    #[error("Persona name must not be empty")]
    EmptyName,

    #[error("Persona generation failed: {0}")]
    Generation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn persona_not_found_is_shown_verbatim() {
        let err = Error::from(PersonaError::NotFound {
            name: "pirate".into(),
        });
        assert_eq!(err.to_string(), "Persona not found for this server: pirate");
    }

    #[test]
    fn corrupted_store_names_the_path() {
        let err = Error::Store(StoreError::Corrupted {
            path: PathBuf::from("data/persona-data.json"),
            reason: "expected value at line 1".into(),
        });
        assert!(err.to_string().contains("persona-data.json"));
        assert!(err.to_string().contains("corrupted"));
    }
}
