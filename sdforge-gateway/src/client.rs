//! The [`SdGateway`] client — a narrow, typed facade over the external SD
//! HTTP engine (§4.1). No retries happen here; retry policy belongs to the
//! caller (QueueEngine).

use std::time::Duration;
use base64::Engine as _;

use sdforge_types::SdForgeError;

use crate::error::{map_http_status, map_reqwest_error};
use crate::types::{
    CensorConfig, ModelInfo, ProgressSnapshot, RawLoraInfo, SamplerInfo, Txt2ImgRequest,
    Txt2ImgResponse,
};

/// Long timeout for generation calls — these can legitimately take minutes.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(600);
/// Short timeout for listing/progress calls.
const LISTING_TIMEOUT: Duration = Duration::from_secs(15);

/// Typed client for the external SD engine's `/sdapi/v1/*` surface.
///
/// Holds no mutable state beyond the HTTP client — callers (QueueEngine)
/// own job bookkeeping. Optional HTTP basic auth is applied per §4.1 when
/// configured.
pub struct SdGateway {
    base_url: String,
    basic_auth: Option<(String, String)>,
    client: reqwest::Client,
}

impl SdGateway {
    /// Create a client pointed at `base_url`, with no basic auth.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            basic_auth: None,
            client: reqwest::Client::new(),
        }
    }

    /// Configure HTTP basic auth (§6 "SD basic-auth user/password").
    #[must_use]
    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((user.into(), password.into()));
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    fn request(&self, method: reqwest::Method, path: &str, timeout: Duration) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, self.url(path)).timeout(timeout);
        if let Some((user, pass)) = &self.basic_auth {
            req = req.basic_auth(user, Some(pass));
        }
        req
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, SdForgeError> {
        let response = self
            .request(reqwest::Method::GET, path, LISTING_TIMEOUT)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, LISTING_TIMEOUT))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, LISTING_TIMEOUT))?;

        if !status.is_success() {
            return Err(map_http_status(status, &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| SdForgeError::Upstream {
                component: "sd-gateway".into(),
                message: format!("malformed response body: {e}"),
            })
    }

    /// `GET /sdapi/v1/sd-models`.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, SdForgeError> {
        tracing::debug!("listing SD models");
        self.get_json("/sdapi/v1/sd-models").await
    }

    /// `GET /sdapi/v1/samplers`.
    pub async fn list_samplers(&self) -> Result<Vec<SamplerInfo>, SdForgeError> {
        tracing::debug!("listing samplers");
        self.get_json("/sdapi/v1/samplers").await
    }

    /// `GET /sdapi/v1/loras`. Returns raw metadata including training tag
    /// frequency when the engine provides it — `sdforge-lora` derives
    /// intelligence from this on `sync_from_gateway`.
    pub async fn list_loras(&self) -> Result<Vec<RawLoraInfo>, SdForgeError> {
        tracing::debug!("listing LoRAs");
        self.get_json("/sdapi/v1/loras").await
    }

    /// `POST /sdapi/v1/txt2img`. LoRA references are rendered into the wire
    /// prompt per §4.1's contract before the request is sent.
    pub async fn txt2img(&self, request: &Txt2ImgRequest) -> Result<Txt2ImgResponse, SdForgeError> {
        let mut body = serde_json::json!({
            "prompt": request.wire_prompt(),
            "negative_prompt": request.negative_prompt,
            "steps": request.steps,
            "width": request.width,
            "height": request.height,
            "sampler_name": request.sampler_name,
            "cfg_scale": request.cfg_scale,
            "seed": request.seed,
        });

        tracing::info!(steps = request.steps, width = request.width, height = request.height, "sending txt2img request");

        let response = self
            .request(reqwest::Method::POST, "/sdapi/v1/txt2img", GENERATION_TIMEOUT)
            .json(&body.take())
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, GENERATION_TIMEOUT))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, GENERATION_TIMEOUT))?;

        if !status.is_success() {
            return Err(map_http_status(status, &text));
        }

        let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| SdForgeError::Upstream {
            component: "sd-gateway".into(),
            message: format!("malformed txt2img response: {e}"),
        })?;

        decode_txt2img_response(&json)
    }

    /// `GET /sdapi/v1/progress`. Lock-free read — only the queue worker
    /// drives `txt2img`, but any caller may poll progress (§5).
    pub async fn poll_progress(&self) -> Result<ProgressSnapshot, SdForgeError> {
        let json: serde_json::Value = self.get_json("/sdapi/v1/progress").await?;
        Ok(ProgressSnapshot {
            progress: json.get("progress").and_then(|v| v.as_f64()).unwrap_or(0.0),
            eta_seconds: json.get("eta_relative").and_then(|v| v.as_f64()),
            current_image: json
                .get("current_image")
                .and_then(|v| v.as_str())
                .and_then(|b64| base64::engine::general_purpose::STANDARD.decode(b64).ok()),
        })
    }

    /// `POST /sdapi/v1/interrupt`. Used by QueueEngine::cancel on a running
    /// job; any image returned after this is discarded by the caller (§5).
    pub async fn interrupt(&self) -> Result<(), SdForgeError> {
        tracing::info!("interrupting in-flight generation");
        let response = self
            .request(reqwest::Method::POST, "/sdapi/v1/interrupt", LISTING_TIMEOUT)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, LISTING_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_http_status(status, &text));
        }
        Ok(())
    }

    /// Invoke the upstream NSFW-masking extension via the engine's generic
    /// script/extras pipeline (§4.1, §6). `image` is raw bytes; returns the
    /// (possibly redacted) output bytes.
    pub async fn censor(&self, image: &[u8], config: &CensorConfig) -> Result<Vec<u8>, SdForgeError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let body = serde_json::json!({
            "image": encoded,
            "config": config,
        });

        tracing::debug!(filter = ?config.filter_type, "invoking censor pass");

        let response = self
            .request(reqwest::Method::POST, "/sdapi/v1/extra-single-image", GENERATION_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, GENERATION_TIMEOUT))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, GENERATION_TIMEOUT))?;

        if !status.is_success() {
            return Err(map_http_status(status, &text));
        }

        let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| SdForgeError::Upstream {
            component: "sd-gateway".into(),
            message: format!("malformed censor response: {e}"),
        })?;

        let image_b64 = json
            .get("image")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SdForgeError::Upstream {
                component: "sd-gateway".into(),
                message: "censor response missing image field".into(),
            })?;

        base64::engine::general_purpose::STANDARD
            .decode(image_b64)
            .map_err(|e| SdForgeError::Upstream {
                component: "sd-gateway".into(),
                message: format!("invalid base64 in censor response: {e}"),
            })
    }
}

fn decode_txt2img_response(json: &serde_json::Value) -> Result<Txt2ImgResponse, SdForgeError> {
    let images_b64 = json
        .get("images")
        .and_then(|v| v.as_array())
        .ok_or_else(|| SdForgeError::Upstream {
            component: "sd-gateway".into(),
            message: "txt2img response missing images array".into(),
        })?;

    let mut images = Vec::with_capacity(images_b64.len());
    for entry in images_b64 {
        let s = entry.as_str().ok_or_else(|| SdForgeError::Upstream {
            component: "sd-gateway".into(),
            message: "image entry was not a string".into(),
        })?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(|e| SdForgeError::Upstream {
                component: "sd-gateway".into(),
                message: format!("invalid base64 image: {e}"),
            })?;
        images.push(bytes);
    }

    let info = json
        .get("info")
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    Ok(Txt2ImgResponse { images, info })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LoraRef;

    #[test]
    fn url_joins_base_and_path() {
        let gw = SdGateway::new("http://localhost:7860/");
        assert_eq!(gw.url("/sdapi/v1/progress"), "http://localhost:7860/sdapi/v1/progress");
    }

    #[test]
    fn wire_prompt_appends_lora_tags_in_order() {
        let req = Txt2ImgRequest {
            prompt: "a cat".into(),
            negative_prompt: String::new(),
            loras: vec![
                LoraRef { name: "animeStyleV4".into(), weight: 0.8 },
                LoraRef { name: "catEars".into(), weight: 1.0 },
            ],
            steps: 20,
            width: 512,
            height: 512,
            sampler_name: "Euler a".into(),
            cfg_scale: 7.0,
            seed: -1,
        };
        assert_eq!(
            req.wire_prompt(),
            "a cat <lora:animeStyleV4:0.800> <lora:catEars:1.000>"
        );
    }

    #[test]
    fn decode_txt2img_response_rejects_missing_images() {
        let json = serde_json::json!({"info": "{}"});
        assert!(decode_txt2img_response(&json).is_err());
    }
}
