//! Post-processing hook invoked after a job's images come back from the
//! SD engine (§4.4: "optional NSFW censoring and UploadRouter"), kept as
//! a trait so the queue itself stays free of any dependency on censor
//! config or upload routing.

use async_trait::async_trait;
use sdforge_types::SdForgeError;

/// What a job produced once post-processing has run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    /// Image bytes after censoring (identical to the input when no censor
    /// pass ran).
    pub images: Vec<Vec<u8>>,
    /// Sink that ultimately stored the image, if any (e.g. `"local"`,
    /// `"hosted"`).
    pub sink: Option<String>,
    /// Public URL for the stored image, if a sink produced one.
    pub url: Option<String>,
    /// Non-fatal issues encountered along the way (e.g. a fallback from
    /// an external host to the local sink).
    pub notes: Vec<String>,
}

/// Hook run by the queue worker after a successful generation, before the
/// job is marked `Completed` (§4.4, §2 control flow).
#[async_trait]
pub trait JobPipeline: Send + Sync {
    /// Apply censoring (if configured) and route the resulting images to
    /// storage. Returning `Err` fails the job.
    async fn process(
        &self,
        images: Vec<Vec<u8>>,
        user_id: Option<&str>,
    ) -> Result<PipelineOutcome, SdForgeError>;
}

/// A pipeline that performs no censoring and no upload, used when neither
/// is configured.
pub struct NoopPipeline;

#[async_trait]
impl JobPipeline for NoopPipeline {
    async fn process(
        &self,
        images: Vec<Vec<u8>>,
        _user_id: Option<&str>,
    ) -> Result<PipelineOutcome, SdForgeError> {
        Ok(PipelineOutcome { images, ..Default::default() })
    }
}
