//! [`LlmRouter`]: the chat and image-assist channels, and the
//! tagged-variant provider registry behind the configurable chat channel
//! (§4.6, §9 "Dynamic provider selection").

use crate::anthropic::AnthropicProvider;
use crate::ollama::OllamaProvider;
use crate::types::{ChatMessage, ChatResponse};

/// A concrete chat-capable provider, or a null-object standing in for an
/// unconfigured/unknown one (§9).
pub enum ChatProvider {
    /// Anthropic's Messages API.
    Anthropic(AnthropicProvider),
    /// A local Ollama-compatible endpoint.
    Ollama(OllamaProvider),
    /// No provider is configured for the requested name; every call
    /// reports structured unavailability rather than panicking.
    Unavailable(String),
}

impl ChatProvider {
    /// Send a chat turn through whichever provider this is (§4.6).
    pub async fn chat(&self, messages: &[ChatMessage]) -> ChatResponse {
        match self {
            ChatProvider::Anthropic(p) => p.chat(messages).await,
            ChatProvider::Ollama(p) => p.chat(messages).await,
            ChatProvider::Unavailable(name) => {
                ChatResponse::failure(name.clone(), format!("no provider configured for '{name}'"))
            }
        }
    }

    /// Whether the provider is reachable (§4.6 `health_check`).
    pub async fn health_check(&self) -> bool {
        match self {
            ChatProvider::Anthropic(p) => p.health_check().await,
            ChatProvider::Ollama(p) => p.health_check().await,
            ChatProvider::Unavailable(_) => false,
        }
    }

    /// The provider's name as used in the registry/config.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ChatProvider::Anthropic(_) => "anthropic",
            ChatProvider::Ollama(_) => "ollama",
            ChatProvider::Unavailable(name) => name,
        }
    }
}

/// Build the configured chat provider from a registry keyed by name
/// (§9). Unknown names resolve to the null-object variant rather than an
/// error, so misconfiguration surfaces through `health_check`/`chat`
/// results instead of at startup.
#[must_use]
pub fn provider_for(
    name: &str,
    api_key: Option<&str>,
    base_url: Option<&str>,
    model: Option<&str>,
    timeout: Option<std::time::Duration>,
) -> ChatProvider {
    match name {
        "anthropic" => {
            let Some(api_key) = api_key else {
                return ChatProvider::Unavailable("anthropic".to_string());
            };
            let mut provider = AnthropicProvider::new(api_key);
            if let Some(base_url) = base_url {
                provider = provider.base_url(base_url);
            }
            if let Some(model) = model {
                provider = provider.model(model);
            }
            if let Some(timeout) = timeout {
                provider = provider.timeout(timeout);
            }
            ChatProvider::Anthropic(provider)
        }
        "ollama" => {
            let mut provider = OllamaProvider::new();
            if let Some(base_url) = base_url {
                provider = provider.base_url(base_url);
            }
            if let Some(model) = model {
                provider = provider.model(model);
            }
            if let Some(timeout) = timeout {
                provider = provider.timeout(timeout);
            }
            ChatProvider::Ollama(provider)
        }
        other => ChatProvider::Unavailable(other.to_string()),
    }
}

/// Exposes the chat channel (user-configurable provider) and the
/// image-assist channel (fixed to the local provider) behind one surface
/// (§4.6).
pub struct LlmRouter {
    chat: ChatProvider,
    image_assist: OllamaProvider,
}

impl LlmRouter {
    /// Build a router with an explicit chat provider and local
    /// image-assist provider.
    #[must_use]
    pub fn new(chat: ChatProvider, image_assist: OllamaProvider) -> Self {
        Self { chat, image_assist }
    }

    /// Send a chat turn through the configurable chat channel.
    pub async fn chat(&self, messages: &[ChatMessage]) -> ChatResponse {
        self.chat.chat(messages).await
    }

    /// Enhance a user's image request through the fixed local channel
    /// (§4.8 step 4): a system prompt drawn from the active personality's
    /// `image_injection_prompt`, plus the user's raw text.
    pub async fn image_assist(&self, image_injection_prompt: &str, user_text: &str) -> ChatResponse {
        let messages = vec![
            ChatMessage::new(crate::types::ChatRole::System, image_injection_prompt),
            ChatMessage::new(crate::types::ChatRole::User, user_text),
        ];
        self.image_assist.chat(&messages).await
    }

    /// Health of the configured chat provider.
    pub async fn chat_health(&self) -> bool {
        self.chat.health_check().await
    }

    /// Health of the local image-assist provider.
    pub async fn image_assist_health(&self) -> bool {
        self.image_assist.health_check().await
    }
}
