//! Request/outcome shapes for [`crate::UploadRouter`] (§4.7).

/// A credential for a per-user or guest external host upload (§3 `HostedUser`).
#[derive(Debug, Clone)]
pub struct HostedUser {
    /// The user this credential belongs to.
    pub user_id: String,
    /// Opaque API key for the external host, stored in plaintext (§4.7,
    /// §9 "Plaintext credentials").
    pub api_key: String,
    /// Default album/collection identifier used when an upload request
    /// doesn't specify one.
    pub default_album: Option<String>,
}

/// An image and its metadata, ready to be routed to a sink (§4.7).
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Raw image bytes.
    pub image: Vec<u8>,
    /// File extension without a leading dot (e.g. `"png"`).
    pub extension: String,
    /// Caller supplying the credential lookup; `None` always falls
    /// through to guest/local sinks.
    pub user_id: Option<String>,
    /// Display title passed through to external hosts when present.
    pub title: Option<String>,
    /// Description passed through to external hosts when present.
    pub description: Option<String>,
    /// Tags passed through to external hosts when present.
    pub tags: Vec<String>,
    /// Album/collection override; falls back to the credential's
    /// `default_album` when unset.
    pub album: Option<String>,
}

impl UploadRequest {
    /// Build a request carrying just the image bytes and extension; all
    /// metadata and the user lookup are left unset.
    #[must_use]
    pub fn new(image: Vec<u8>, extension: impl Into<String>) -> Self {
        Self {
            image,
            extension: extension.into(),
            user_id: None,
            title: None,
            description: None,
            tags: Vec::new(),
            album: None,
        }
    }

    /// Attach the caller's user id, enabling per-user credential lookup.
    #[must_use]
    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// A sink that was tried and failed before the one that ultimately
/// succeeded (§4.7 "the final result reports... any earlier failures").
#[derive(Debug, Clone)]
pub struct SinkFailure {
    /// Which sink was attempted.
    pub sink: String,
    /// Why it failed.
    pub message: String,
}

/// The result of routing an image through the sink chain (§4.7).
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// The sink that ultimately served the upload: `"personal"`,
    /// `"guest"`, or `"local"`.
    pub sink: String,
    /// Canonical public URL of the stored image.
    pub url: String,
    /// Opaque handle for deleting the upload, when the sink exposes one.
    pub deletion_handle: Option<String>,
    /// Sinks tried before the one that succeeded, in attempt order.
    pub fallbacks: Vec<SinkFailure>,
}

/// The result of a successful external-host upload (§4.7).
#[derive(Debug, Clone)]
pub(crate) struct ExternalUploadResult {
    pub url: String,
    pub deletion_handle: Option<String>,
}
