//! A thin Anthropic Messages API client, grounded on the same
//! request/response shape as the broader provider family but trimmed to
//! the chat-only contract this system needs (§4.6).

use std::time::Duration;

use sdforge_types::SdForgeError;

use crate::types::{ChatMessage, ChatResponse};

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the Anthropic Messages API, used as the chat-channel
/// provider (§4.6).
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Build a client with a default model and base URL.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_default(),
        }
    }

    /// Override the default model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL (tests, proxies).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Override the per-call request timeout (§6 configuration surface).
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder().timeout(timeout).build().unwrap_or_default();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    /// Send a chat turn, returning a structured result (§4.6 contract:
    /// never throws across the provider boundary).
    pub async fn chat(&self, messages: &[ChatMessage]) -> ChatResponse {
        match self.chat_inner(messages).await {
            Ok(content) => ChatResponse::success("anthropic", content),
            Err(err) => ChatResponse::failure("anthropic", err.to_string()),
        }
    }

    async fn chat_inner(&self, messages: &[ChatMessage]) -> Result<String, SdForgeError> {
        let (system, turns): (Vec<&ChatMessage>, Vec<&ChatMessage>) =
            messages.iter().partition(|m| m.role == crate::types::ChatRole::System);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 1024,
            "system": system.iter().map(|m| m.content.clone()).collect::<Vec<_>>().join("\n"),
            "messages": turns.iter().map(|m| serde_json::json!({
                "role": m.role.as_str(),
                "content": m.content,
            })).collect::<Vec<_>>(),
        });

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, "anthropic"))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| map_reqwest_error(e, "anthropic"))?;
        if !status.is_success() {
            return Err(map_http_status("anthropic", status, &text));
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| SdForgeError::Upstream { component: "anthropic".into(), message: format!("invalid JSON: {e}") })?;

        json["content"]
            .as_array()
            .and_then(|blocks| blocks.iter().find_map(|b| b["text"].as_str()))
            .map(str::to_string)
            .ok_or_else(|| SdForgeError::Upstream {
                component: "anthropic".into(),
                message: "response had no text content block".into(),
            })
    }

    /// Whether the configured endpoint is reachable and credentials are
    /// accepted (§4.6 `health_check`).
    pub async fn health_check(&self) -> bool {
        self.chat_inner(&[ChatMessage::new(crate::types::ChatRole::User, "ping")])
            .await
            .is_ok()
    }

    /// Models this provider is configured to expose. Anthropic has no
    /// public listing endpoint in wide use, so this returns the
    /// configured default.
    pub fn list_models(&self) -> Vec<String> {
        vec![self.model.clone()]
    }
}

fn map_http_status(component: &str, status: reqwest::StatusCode, body: &str) -> SdForgeError {
    match status.as_u16() {
        401 | 403 => SdForgeError::Upstream { component: component.into(), message: format!("authentication failed: {body}") },
        404 => SdForgeError::NotFound(format!("{component}: model not found")),
        429 => SdForgeError::Upstream { component: component.into(), message: format!("rate limited: {body}") },
        500..=599 => SdForgeError::Upstream { component: component.into(), message: format!("service unavailable: {body}") },
        _ => SdForgeError::Validation(format!("{component}: HTTP {status}: {body}")),
    }
}

fn map_reqwest_error(err: reqwest::Error, component: &str) -> SdForgeError {
    if err.is_timeout() {
        SdForgeError::Timeout(REQUEST_TIMEOUT)
    } else {
        SdForgeError::Transport { component: component.into(), message: err.to_string() }
    }
}
