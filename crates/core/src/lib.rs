//! # Kudachat Core
//!
//! Domain types, traits, and error definitions for the Kudachat persona
//! gateway. This crate has **zero framework dependencies**: it defines the
//! domain model that the store, provider, channel and agent crates implement
//! against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (LLM backend, chat platform) is a trait here.
//! Implementations live in their respective crates, which keeps the
//! orchestration logic testable with scripted mocks.

pub mod channel;
pub mod error;
pub mod message;
pub mod persona;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use channel::{
    Attachment, AttachmentKind, Channel, ChannelEvent, ChannelId, ChannelMessage,
    CommandInvocation,
};
pub use error::{ChannelError, Error, PersonaError, ProviderError, Result, StoreError};
pub use message::{ContentPart, ImageUrl, Message, MessageContent, Role};
pub use persona::{GenerationParameters, NamedPersona, Persona};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseContent, ResponsePart, Usage};
