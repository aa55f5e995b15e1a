//! [`UploadPipeline`]: the real [`JobPipeline`] wired in production,
//! composing optional NSFW censoring with [`UploadRouter`] routing
//! (§4.4 "optional NSFW censoring and UploadRouter").
//!
//! This is the first non-`Noop` pipeline in the workspace. It lives
//! here rather than in `sdforge-queue`, `sdforge-gateway`, or
//! `sdforge-upload` because it depends on all three and none of those
//! crates should depend on the other two just to support this
//! composition.

use std::sync::Arc;

use async_trait::async_trait;
use sdforge_gateway::{CensorConfig, SdGateway};
use sdforge_queue::{JobPipeline, PipelineOutcome};
use sdforge_types::SdForgeError;
use sdforge_upload::{UploadRequest, UploadRouter};

/// Composes censoring and upload routing for a completed generation job.
pub struct UploadPipeline {
    gateway: Arc<SdGateway>,
    censor: Option<CensorConfig>,
    upload: Arc<UploadRouter>,
    max_file_size: usize,
    local_fallback: bool,
}

impl UploadPipeline {
    /// `censor` is `None` when the NSFW filter is disabled; images larger
    /// than `max_file_size` are logged as oversized but still routed
    /// through `upload`'s normal sink chain (§6 "max file size").
    #[must_use]
    pub fn new(
        gateway: Arc<SdGateway>,
        censor: Option<CensorConfig>,
        upload: Arc<UploadRouter>,
        max_file_size: usize,
        local_fallback: bool,
    ) -> Self {
        Self { gateway, censor, upload, max_file_size, local_fallback }
    }

    async fn censor_one(&self, image: Vec<u8>) -> Result<Vec<u8>, SdForgeError> {
        match &self.censor {
            Some(config) => self.gateway.censor(&image, config).await,
            None => Ok(image),
        }
    }
}

#[async_trait]
impl JobPipeline for UploadPipeline {
    async fn process(
        &self,
        images: Vec<Vec<u8>>,
        user_id: Option<&str>,
    ) -> Result<PipelineOutcome, SdForgeError> {
        let mut notes = Vec::new();
        let mut censored = Vec::with_capacity(images.len());
        for image in images {
            censored.push(self.censor_one(image).await?);
        }

        let Some(first) = censored.first().cloned() else {
            return Ok(PipelineOutcome { images: censored, ..Default::default() });
        };

        if first.len() > self.max_file_size {
            notes.push(format!(
                "image of {} bytes exceeds max_file_size {}, routing through the sink chain as usual",
                first.len(),
                self.max_file_size
            ));
            tracing::warn!(bytes = first.len(), limit = self.max_file_size, "image exceeds hosting max file size");
        }

        let mut request = UploadRequest::new(first, "png");
        if let Some(user_id) = user_id {
            request = request.for_user(user_id);
        }

        let outcome = self.upload.upload(request).await;

        if !self.local_fallback && outcome.sink == "local" && !outcome.fallbacks.is_empty() {
            tracing::warn!("external hosting failed and local fallback is disabled");
            return Err(SdForgeError::Upstream {
                component: "upload".to_string(),
                message: outcome
                    .fallbacks
                    .iter()
                    .map(|f| format!("{}: {}", f.sink, f.message))
                    .collect::<Vec<_>>()
                    .join("; "),
            });
        }

        notes.extend(outcome.fallbacks.iter().map(|f| format!("{} failed: {}", f.sink, f.message)));

        Ok(PipelineOutcome { images: censored, sink: Some(outcome.sink), url: Some(outcome.url), notes })
    }
}
