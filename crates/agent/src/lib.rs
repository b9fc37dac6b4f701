//! The conversation engine of Kudachat.
//!
//! An inbound event flows through here as follows:
//!
//! 1. **Dispatch**: the dispatcher decides whether a message concerns the bot
//!    and routes commands to the command layer
//! 2. **Resolve**: the active persona and model are read from the store and
//!    merged with the default generation parameters
//! 3. **Complete**: the system prompt, channel context and new turn are sent
//!    to the provider
//! 4. **Record**: the exchange is appended to the context cache and the token
//!    usage is added to the community's counter
//!
//! Commands can also generate personas from an idea through the provider.

pub mod commands;
pub mod dispatcher;
pub mod generator;
pub mod orchestrator;
pub mod persona;
pub mod prompts;
pub mod state;

#[cfg(test)]
mod test_helpers;

pub use commands::{Command, CommandError, CommandHandler, CommandReply, command_definitions};
pub use dispatcher::Dispatcher;
pub use generator::{GeneratedPersona, PersonaGenerator};
pub use orchestrator::{CompletionOrchestrator, InboundTurn, ReplyOutcome};
pub use state::{BotSettings, BotState};
