//! Message and response shapes shared by every provider (§4.6).

use serde::{Deserialize, Serialize};

/// Who said a message in a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// A system/personality prompt.
    System,
    /// The end user.
    User,
    /// A prior assistant reply, given back as context.
    Assistant,
}

impl ChatRole {
    /// The string used on provider wire formats.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One turn in a chat conversation, provider-agnostic (§4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who said it.
    pub role: ChatRole,
    /// The text content.
    pub content: String,
}

impl ChatMessage {
    /// Convenience constructor.
    #[must_use]
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// The uniform result of a `chat` call (§4.6). Providers never throw
/// across this boundary: failure is `success: false` plus `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    /// The reply text; empty on failure.
    pub content: String,
    /// Whether the call succeeded.
    pub success: bool,
    /// Which provider produced this response.
    pub provider: String,
    /// Failure detail, present iff `success` is false.
    pub error: Option<String>,
}

impl ChatResponse {
    pub(crate) fn failure(provider: impl Into<String>, error: impl Into<String>) -> Self {
        Self { content: String::new(), success: false, provider: provider.into(), error: Some(error.into()) }
    }

    pub(crate) fn success(provider: impl Into<String>, content: impl Into<String>) -> Self {
        Self { content: content.into(), success: true, provider: provider.into(), error: None }
    }
}

/// One chunk of a streamed chat reply (§4.6 optional `chat_stream`).
#[derive(Debug, Clone, PartialEq)]
pub struct ChatChunk {
    /// Incremental text for this chunk.
    pub delta: String,
    /// Whether this is the final chunk.
    pub done: bool,
}
