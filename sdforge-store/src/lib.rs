#![deny(missing_docs)]
//! Per-context conversation history, personalities, moderation, and rate
//! limiting (§4.5 ConversationStore).

mod context;
mod personalities;
mod store;
mod types;

pub use context::context_key;
pub use personalities::BUILTIN_PERSONALITIES;
pub use store::ConversationStore;
pub use types::{
    CleanupMethod, CleanupPolicy, CleanupReport, Message, ModerationStatus, Personality, RateCheck, Role,
    UserSettings,
};
