#![deny(missing_docs)]
//! Multi-provider LLM abstraction: a chat channel (configurable
//! provider) and an image-assist channel (fixed to the local provider)
//! behind one uniform message/response shape (§4.6 LLMRouter).

mod anthropic;
mod ollama;
mod router;
mod types;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use router::{provider_for, ChatProvider, LlmRouter};
pub use types::{ChatChunk, ChatMessage, ChatResponse, ChatRole};
