//! Chat channel implementations for Kudachat.
//!
//! Each channel connects to a chat platform and relays events to/from the
//! dispatcher. Channels are trait-based and platform-agnostic.
//!
//! Available channels:
//! - **Discord**: REST delivery, inbound events injected by the ingress relay

pub mod discord;

pub use discord::{DiscordChannel, DiscordConfig};
