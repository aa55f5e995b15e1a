//! [`ExternalHostClient`]: a generic image-hosting client used for both
//! the per-user and guest external sinks (§4.7). The wire shape is a
//! plain multipart POST plus a JSON envelope, mirroring the gateway's
//! HTTP-client style rather than any specific third-party host's API.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use sdforge_types::SdForgeError;

use crate::types::ExternalUploadResult;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for an external image-hosting endpoint, used as either the
/// per-user or guest sink in the upload chain (§4.7).
pub struct ExternalHostClient {
    base_url: String,
    client: reqwest::Client,
}

impl ExternalHostClient {
    /// Build a client pointed at the given host's upload endpoint.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_default(),
        }
    }

    /// Override the per-call request timeout (§6 configuration surface).
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder().timeout(timeout).build().unwrap_or_default();
        self
    }

    fn upload_url(&self) -> String {
        format!("{}/api/upload", self.base_url)
    }

    /// Upload an image with optional metadata, authenticated with
    /// `api_key`. Returns the canonical URL and, when the host exposes
    /// one, a deletion handle (§4.7).
    pub(crate) async fn upload(
        &self,
        image: Vec<u8>,
        extension: &str,
        api_key: &str,
        title: Option<&str>,
        description: Option<&str>,
        tags: &[String],
        album: Option<&str>,
    ) -> Result<ExternalUploadResult, SdForgeError> {
        let filename = format!("upload.{extension}");
        let mime = mime_for_extension(extension);

        let mut form = Form::new().part(
            "file",
            Part::bytes(image).file_name(filename).mime_str(mime).map_err(|e| {
                SdForgeError::Validation(format!("unsupported image extension '{extension}': {e}"))
            })?,
        );
        if let Some(title) = title {
            form = form.text("title", title.to_string());
        }
        if let Some(description) = description {
            form = form.text("description", description.to_string());
        }
        if !tags.is_empty() {
            form = form.text("tags", tags.join(","));
        }
        if let Some(album) = album {
            form = form.text("album", album.to_string());
        }

        let response = self
            .client
            .post(self.upload_url())
            .header("Authorization", format!("Bearer {api_key}"))
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(SdForgeError::Upstream { component: "upload-host".into(), message: text });
        }

        let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| SdForgeError::Upstream {
            component: "upload-host".into(),
            message: format!("invalid JSON: {e}"),
        })?;

        let url = json["url"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SdForgeError::Upstream {
                component: "upload-host".into(),
                message: "response had no url field".into(),
            })?;
        let deletion_handle = json["deletion_handle"].as_str().map(str::to_string);

        Ok(ExternalUploadResult { url, deletion_handle })
    }
}

fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/png",
    }
}

fn map_reqwest_error(err: reqwest::Error) -> SdForgeError {
    if err.is_timeout() {
        SdForgeError::Timeout(REQUEST_TIMEOUT)
    } else {
        SdForgeError::Transport { component: "upload-host".into(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn upload_extracts_url_and_deletion_handle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": "https://host.example/i/abc123.png",
                "deletion_handle": "del-abc123",
            })))
            .mount(&server)
            .await;

        let client = ExternalHostClient::new(server.uri());
        let result = client
            .upload(vec![1, 2, 3], "png", "key-1", Some("t"), None, &[], None)
            .await
            .unwrap();

        assert_eq!(result.url, "https://host.example/i/abc123.png");
        assert_eq!(result.deletion_handle.as_deref(), Some("del-abc123"));
    }

    #[tokio::test]
    async fn upload_reports_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let client = ExternalHostClient::new(server.uri());
        let err = client.upload(vec![1], "png", "bad-key", None, None, &[], None).await.unwrap_err();
        assert!(matches!(err, SdForgeError::Upstream { .. }));
    }
}
