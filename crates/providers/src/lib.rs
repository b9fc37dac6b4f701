//! Chat-completion provider implementations for Kudachat.
//!
//! All providers implement the `kudachat_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
