//! [`LocalFileSink`]: the last-resort sink, writing to a local directory
//! served by the external HTTP file server (§4.7, §6 `images/{yyyy}/{mm}/{dd}/{uuid}.{ext}`).

use chrono::Utc;
use sdforge_types::SdForgeError;

/// Writes images under `base_dir/images/{yyyy}/{mm}/{dd}/{uuid}.{ext}`
/// and reports their public URL under `base_url` (§4.7, §6).
pub struct LocalFileSink {
    base_dir: String,
    base_url: String,
}

impl LocalFileSink {
    /// `base_dir` is the filesystem root images are written under;
    /// `base_url` is the external HTTP file server's base (no trailing
    /// slash expected on either).
    #[must_use]
    pub fn new(base_dir: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self { base_dir: base_dir.into(), base_url: base_url.into() }
    }

    /// Store `image` under today's date bucket and return its public
    /// URL.
    pub async fn store(&self, image: &[u8], extension: &str) -> Result<String, SdForgeError> {
        let now = Utc::now();
        let relative = format!(
            "images/{:04}/{:02}/{:02}/{}.{}",
            now.format("%Y"),
            now.format("%m"),
            now.format("%d"),
            uuid::Uuid::new_v4(),
            extension
        );
        let full_path = format!("{}/{relative}", self.base_dir);

        if let Some(parent) = std::path::Path::new(&full_path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        }
        tokio::fs::write(&full_path, image).await.map_err(|e| SdForgeError::Internal(Box::new(e)))?;

        Ok(format!("{}/{relative}", self.base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stored_image_is_readable_back_and_url_is_dated() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalFileSink::new(dir.path().to_str().unwrap(), "http://files.example");

        let url = sink.store(&[1, 2, 3, 4], "png").await.unwrap();
        assert!(url.starts_with("http://files.example/images/"));
        assert!(url.ends_with(".png"));

        let year = Utc::now().format("%Y").to_string();
        assert!(url.contains(&year));
    }

    #[tokio::test]
    async fn distinct_stores_produce_distinct_urls() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalFileSink::new(dir.path().to_str().unwrap(), "http://files.example");

        let a = sink.store(&[1], "png").await.unwrap();
        let b = sink.store(&[1], "png").await.unwrap();
        assert_ne!(a, b);
    }
}
