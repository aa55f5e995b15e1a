//! Internal error helpers mapping HTTP/reqwest failures onto
//! [`SdForgeError`].

use std::time::Duration;

use sdforge_types::SdForgeError;

const COMPONENT: &str = "sd-gateway";

/// Map an HTTP status code from the SD engine to a [`SdForgeError`].
pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> SdForgeError {
    match status.as_u16() {
        401 | 403 => SdForgeError::Upstream {
            component: COMPONENT.into(),
            message: format!("authentication failed: {body}"),
        },
        404 => SdForgeError::NotFound(body.to_string()),
        500..=599 => SdForgeError::Upstream {
            component: COMPONENT.into(),
            message: format!("HTTP {status}: {body}"),
        },
        _ => SdForgeError::Validation(format!("HTTP {status}: {body}")),
    }
}

/// Map a [`reqwest::Error`] to a [`SdForgeError`].
pub(crate) fn map_reqwest_error(err: reqwest::Error, configured_timeout: Duration) -> SdForgeError {
    if err.is_timeout() {
        SdForgeError::Timeout(configured_timeout)
    } else {
        SdForgeError::Transport {
            component: COMPONENT.into(),
            message: err.to_string(),
        }
    }
}
