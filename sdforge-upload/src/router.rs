//! [`UploadRouter`]: routes an image through the prioritized sink chain
//! (§4.7) — per-user external host, then guest external host, then the
//! local file sink — falling through on failure and reporting the trail.

use crate::credentials::CredentialStore;
use crate::external::ExternalHostClient;
use crate::local::LocalFileSink;
use crate::types::{SinkFailure, UploadOutcome, UploadRequest};

/// Guest (non-personalized) credential for the external host, used when
/// the caller has no stored per-user credential (§4.7 step 2).
pub struct GuestCredential {
    /// API key for the external host.
    pub api_key: String,
    /// Default album for guest uploads.
    pub album: Option<String>,
}

/// Routes an image to the best available sink in priority order (§4.7).
pub struct UploadRouter {
    credentials: CredentialStore,
    external: Option<ExternalHostClient>,
    guest: Option<GuestCredential>,
    local: LocalFileSink,
}

impl UploadRouter {
    /// Build a router. `external` is `None` when no external host is
    /// configured at all, in which case only the local sink is ever
    /// used. `guest` is the fallback credential for callers without a
    /// `user_id` or a stored one.
    #[must_use]
    pub fn new(
        credentials: CredentialStore,
        external: Option<ExternalHostClient>,
        guest: Option<GuestCredential>,
        local: LocalFileSink,
    ) -> Self {
        Self { credentials, external, guest, local }
    }

    /// Route `request` through the sink chain, falling through on
    /// failure, and record the successful attempt in upload history
    /// (§4.7, §3 "UploadRouter owns... upload history").
    pub async fn upload(&self, request: UploadRequest) -> UploadOutcome {
        let mut fallbacks = Vec::new();

        if let Some(external) = &self.external {
            if let Some(user_id) = &request.user_id {
                match self.credentials.get(user_id).await {
                    Ok(Some(credential)) => {
                        let album = request.album.as_deref().or(credential.default_album.as_deref());
                        match external
                            .upload(
                                request.image.clone(),
                                &request.extension,
                                &credential.api_key,
                                request.title.as_deref(),
                                request.description.as_deref(),
                                &request.tags,
                                album,
                            )
                            .await
                        {
                            Ok(result) => {
                                return self
                                    .finish(
                                        "personal",
                                        result.url,
                                        result.deletion_handle,
                                        Some(user_id),
                                        fallbacks,
                                    )
                                    .await;
                            }
                            Err(err) => fallbacks.push(SinkFailure { sink: "personal".into(), message: err.to_string() }),
                        }
                    }
                    Ok(None) => {}
                    Err(err) => fallbacks.push(SinkFailure { sink: "personal".into(), message: err.to_string() }),
                }
            }

            if let Some(guest) = &self.guest {
                let album = request.album.as_deref().or(guest.album.as_deref());
                match external
                    .upload(
                        request.image.clone(),
                        &request.extension,
                        &guest.api_key,
                        request.title.as_deref(),
                        request.description.as_deref(),
                        &request.tags,
                        album,
                    )
                    .await
                {
                    Ok(result) => {
                        return self
                            .finish("guest", result.url, result.deletion_handle, request.user_id.as_deref(), fallbacks)
                            .await;
                    }
                    Err(err) => fallbacks.push(SinkFailure { sink: "guest".into(), message: err.to_string() }),
                }
            }
        }

        match self.local.store(&request.image, &request.extension).await {
            Ok(url) => self.finish("local", url, None, request.user_id.as_deref(), fallbacks).await,
            Err(err) => {
                fallbacks.push(SinkFailure { sink: "local".into(), message: err.to_string() });
                tracing::error!(failures = ?fallbacks, "all upload sinks failed");
                UploadOutcome { sink: "none".into(), url: String::new(), deletion_handle: None, fallbacks }
            }
        }
    }

    async fn finish(
        &self,
        sink: &str,
        url: String,
        deletion_handle: Option<String>,
        user_id: Option<&str>,
        fallbacks: Vec<SinkFailure>,
    ) -> UploadOutcome {
        if let Err(err) = self.credentials.record_history(user_id, sink, &url, deletion_handle.as_deref()).await {
            tracing::warn!(error = %err, "failed to record upload history");
        }
        UploadOutcome { sink: sink.to_string(), url, deletion_handle, fallbacks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn credential_store() -> CredentialStore {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        CredentialStore::from_pool(pool)
    }

    #[tokio::test]
    async fn per_user_credential_wins_when_present() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"url": "https://host/personal.png"})))
            .mount(&server)
            .await;

        let credentials = credential_store().await;
        credentials.set("u1", "personal-key", None).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let router = UploadRouter::new(
            credentials,
            Some(ExternalHostClient::new(server.uri())),
            Some(GuestCredential { api_key: "guest-key".into(), album: None }),
            LocalFileSink::new(dir.path().to_str().unwrap(), "http://files.example"),
        );

        let outcome = router.upload(UploadRequest::new(vec![1], "png").for_user("u1")).await;
        assert_eq!(outcome.sink, "personal");
        assert_eq!(outcome.url, "https://host/personal.png");
        assert!(outcome.fallbacks.is_empty());
    }

    #[tokio::test]
    async fn falls_through_to_guest_when_user_has_no_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"url": "https://host/guest.png"})))
            .mount(&server)
            .await;

        let router = UploadRouter::new(
            credential_store().await,
            Some(ExternalHostClient::new(server.uri())),
            Some(GuestCredential { api_key: "guest-key".into(), album: None }),
            LocalFileSink::new(tempfile::tempdir().unwrap().path().to_str().unwrap(), "http://files.example"),
        );

        let outcome = router.upload(UploadRequest::new(vec![1], "png").for_user("stranger")).await;
        assert_eq!(outcome.sink, "guest");
    }

    #[tokio::test]
    async fn falls_through_to_local_when_external_host_rejects_both() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&server)
            .await;

        let credentials = credential_store().await;
        credentials.set("u1", "personal-key", None).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let router = UploadRouter::new(
            credentials,
            Some(ExternalHostClient::new(server.uri())),
            Some(GuestCredential { api_key: "guest-key".into(), album: None }),
            LocalFileSink::new(dir.path().to_str().unwrap(), "http://files.example"),
        );

        let outcome = router.upload(UploadRequest::new(vec![1], "png").for_user("u1")).await;
        assert_eq!(outcome.sink, "local");
        assert_eq!(outcome.fallbacks.len(), 2);
        assert_eq!(outcome.fallbacks[0].sink, "personal");
        assert_eq!(outcome.fallbacks[1].sink, "guest");
    }

    #[tokio::test]
    async fn no_external_host_configured_goes_straight_to_local() {
        let dir = tempfile::tempdir().unwrap();
        let router = UploadRouter::new(
            credential_store().await,
            None,
            None,
            LocalFileSink::new(dir.path().to_str().unwrap(), "http://files.example"),
        );

        let outcome = router.upload(UploadRequest::new(vec![1], "png")).await;
        assert_eq!(outcome.sink, "local");
        assert!(outcome.fallbacks.is_empty());
    }
}
