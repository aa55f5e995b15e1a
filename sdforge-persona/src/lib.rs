#![deny(missing_docs)]
//! The single-call "chat with context" turn: personality, history, and
//! image-intent detection over [`sdforge_store`], [`sdforge_llm`], and
//! [`sdforge_tools`] (§4.8 PersonalityChatCore).

mod chat;
mod intent;
mod thinking;

pub use chat::{ChatTurnOutcome, ChatTurnRequest, PersonalityChatCore};
pub use intent::detect_image_intent;
pub use thinking::strip_thinking;
