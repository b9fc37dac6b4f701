//! State storage for Kudachat.
//!
//! - [`ConfigStore`]: the durable JSON document holding personas, active
//!   persona pointers, the active model and token usage.
//! - [`ContextCache`]: bounded conversational memory per channel, kept in
//!   process memory only.

pub mod config_store;
pub mod context;
pub mod document;

pub use config_store::{ConfigStore, StoreSeed};
pub use context::{ContextCache, ContextKey};
pub use document::{DEFAULT_PERSONA, PersonaMap, StoreDocument};
