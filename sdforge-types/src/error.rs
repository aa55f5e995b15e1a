//! The error taxonomy shared by every `sdforge-*` crate.
//!
//! One enum per cross-cutting concern: component-local errors convert
//! into [`SdForgeError`] via `#[from]` at the point they cross a
//! component boundary (the tool surface, the Discord front-end).

use std::time::Duration;

/// The error kinds this workspace's tools and components surface.
///
/// Every component boundary converts its local error into one of these
/// before it crosses into ToolSurface or the Discord front-end — nothing
/// propagates a raw `reqwest::Error` or `sqlx::Error` past its owning
/// crate.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SdForgeError {
    /// Missing or malformed required configuration. Surfaced at startup
    /// and on first use of the affected component; never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network/HTTP failure to an external service (SD engine, LLM
    /// provider, hosting API). Retried only when the caller explicitly
    /// asks — this crate never retries on its own.
    #[error("transport error talking to {component}: {message}")]
    Transport {
        /// The component that owns the failing connection.
        component: String,
        /// Human-readable failure detail.
        message: String,
    },

    /// The external service returned a structured failure.
    #[error("upstream error from {component}: {message}")]
    Upstream {
        /// The component that owns the failing connection.
        component: String,
        /// The upstream's own error text, passed through where safe.
        message: String,
    },

    /// Operation exceeded its per-call budget. Terminal for jobs.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Bad input to a tool or operation (out-of-range, missing required).
    /// Surfaced without side effects.
    #[error("validation error: {0}")]
    Validation(String),

    /// A LoRA combination violates a conflict rule.
    #[error("conflict: {rule}: {message}")]
    Conflict {
        /// The violated rule's identifier, e.g. `at-most-one-character`.
        rule: String,
        /// Human-readable detail plus remediation suggestion.
        message: String,
    },

    /// The user is suspended, timed out, or rate-limited.
    #[error("policy error: {0}")]
    Policy(String),

    /// A job id, personality name, or category path was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Catch-all, logged with context and surfaced generically.
    #[error("internal error: {0}")]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl SdForgeError {
    /// Whether retrying the same call without caller intervention could
    /// plausibly succeed. Jobs use this to decide whether to report the
    /// failure as retryable in their structured error payload — the
    /// caller still makes the retry decision (§7: "retried only when the
    /// caller explicitly asks").
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout(_))
    }

    /// The machine-readable kind tag surfaced alongside the human-readable
    /// reason in tool results and Discord replies (§7).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Transport { .. } => "transport",
            Self::Upstream { .. } => "upstream",
            Self::Timeout(_) => "timeout",
            Self::Validation(_) => "validation",
            Self::Conflict { .. } => "conflict",
            Self::Policy(_) => "policy",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
        }
    }
}
