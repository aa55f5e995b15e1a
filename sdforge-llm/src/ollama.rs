//! A local Ollama-compatible chat client, used as the fixed image-assist
//! provider (§4.6: "the image-assist channel's... fixed to the local
//! provider").

use std::time::Duration;

use sdforge_types::SdForgeError;

use crate::types::{ChatMessage, ChatResponse};

const DEFAULT_MODEL: &str = "llama3.2";
const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for a local Ollama-compatible chat endpoint.
pub struct OllamaProvider {
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Build a client pointed at the default local endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self {
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

    /// Override the API base URL.
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

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }

    /// Send a chat turn (§4.6 contract: never throws across the boundary).
    pub async fn chat(&self, messages: &[ChatMessage]) -> ChatResponse {
        match self.chat_inner(messages).await {
            Ok(content) => ChatResponse::success("ollama", content),
            Err(err) => ChatResponse::failure("ollama", err.to_string()),
        }
    }

    async fn chat_inner(&self, messages: &[ChatMessage]) -> Result<String, SdForgeError> {
        let body = serde_json::json!({
            "model": self.model,
            "stream": false,
            "messages": messages.iter().map(|m| serde_json::json!({
                "role": m.role.as_str(),
                "content": m.content,
            })).collect::<Vec<_>>(),
        });

        let response = self
            .client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| map_reqwest_error(e))?;
        if !status.is_success() {
            return Err(SdForgeError::Upstream { component: "ollama".into(), message: text });
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| SdForgeError::Upstream { component: "ollama".into(), message: format!("invalid JSON: {e}") })?;

        json["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SdForgeError::Upstream { component: "ollama".into(), message: "no message.content in response".into() })
    }

    /// Whether the local endpoint is reachable (§4.6 `health_check`).
    pub async fn health_check(&self) -> bool {
        self.client.get(self.tags_url()).send().await.map(|r| r.status().is_success()).unwrap_or(false)
    }

    /// Models currently pulled on the local endpoint.
    pub async fn list_models(&self) -> Result<Vec<String>, SdForgeError> {
        let response = self.client.get(self.tags_url()).send().await.map_err(|e| map_reqwest_error(e))?;
        if !response.status().is_success() {
            return Err(SdForgeError::Upstream { component: "ollama".into(), message: "failed to list models".into() });
        }
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SdForgeError::Upstream { component: "ollama".into(), message: e.to_string() })?;
        Ok(json["models"]
            .as_array()
            .map(|models| models.iter().filter_map(|m| m["name"].as_str().map(str::to_string)).collect())
            .unwrap_or_default())
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn map_reqwest_error(err: reqwest::Error) -> SdForgeError {
    if err.is_timeout() {
        SdForgeError::Timeout(REQUEST_TIMEOUT)
    } else {
        SdForgeError::Transport { component: "ollama".into(), message: err.to_string() }
    }
}
