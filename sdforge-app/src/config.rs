//! Environment-driven configuration (§6 "Configuration surface").
//!
//! No dedicated config crate here; the binary parses its own env
//! directly rather than introducing a config layer the rest of the
//! workspace doesn't have.

use std::env;
use std::time::Duration;

use sdforge_gateway::{CensorConfig, CensorThresholds, FilterType, MaskShape};
use sdforge_store::{CleanupMethod, CleanupPolicy};
use sdforge_types::SdForgeError;

/// Everything needed to wire up one run of the `sdforge` binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the SD engine (`SD_BASE_URL`).
    pub sd_base_url: String,
    /// Basic-auth credentials for the SD engine, if required.
    pub sd_basic_auth: Option<(String, String)>,
    /// Directory the local upload sink writes under.
    pub image_output_path: String,

    /// Which chat provider backs ordinary conversation (`CHAT_PROVIDER`).
    pub chat_provider: String,
    /// API key for the configured chat provider, if it needs one.
    pub chat_api_key: Option<String>,
    /// Base URL override for the configured chat provider.
    pub chat_base_url: Option<String>,
    /// Default model for the configured chat provider.
    pub chat_model: Option<String>,
    /// Per-call timeout for chat provider requests.
    pub chat_timeout: Duration,
    /// Base URL for the local image-assist provider (always Ollama).
    pub image_assist_base_url: Option<String>,
    /// Default model for the image-assist provider.
    pub image_assist_model: Option<String>,

    /// Base URL of the external image-hosting API, when configured.
    pub hosting_base_url: Option<String>,
    /// Guest (non-personalized) API key for the external host.
    pub hosting_guest_api_key: Option<String>,
    /// Default album for guest uploads.
    pub hosting_guest_album: Option<String>,
    /// Per-call timeout for hosting API requests.
    pub hosting_timeout: Duration,
    /// Images larger than this never try the external host.
    pub hosting_max_file_size: usize,
    /// Whether a failed external upload may fall back to the local sink.
    pub hosting_local_fallback: bool,

    /// Per-minute chat rate limit (§4.5 `check_rate`).
    pub chat_rate_limit_per_minute: i64,
    /// Per-minute generation rate limit.
    pub generation_rate_limit_per_minute: i64,
    /// User ids permitted to run administrative tool calls.
    pub admin_user_ids: Vec<String>,

    /// Whether the startup auto-clean pass is enabled.
    pub auto_clean_enabled: bool,
    /// Trigger policy for the auto-clean pass.
    pub cleanup_policy: CleanupPolicy,

    /// Host the local file sink's URLs are built from.
    pub file_server_host: String,
    /// Port the local file sink's URLs are built from.
    pub file_server_port: u16,

    /// Whether the NudeNet censor pass runs at all.
    pub nsfw_filter_enabled: bool,
    /// Full censor-pass configuration, used when `nsfw_filter_enabled`.
    pub censor: CensorConfig,

    /// SQLite path backing `ConversationStore`.
    pub conversation_db_path: String,
    /// SQLite path backing `LoraCatalog`.
    pub lora_db_path: String,
    /// SQLite path backing `CredentialStore`.
    pub credentials_db_path: String,

    /// Discord bot token, required only for the `discord` subcommand.
    pub discord_token: Option<String>,
}

fn env_var(name: &str) -> Result<String, SdForgeError> {
    env::var(name).map_err(|_| SdForgeError::Configuration(format!("missing required env var {name}")))
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_bool(name: &str, default: bool) -> bool {
    env_opt(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    env_opt(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env_opt(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    env_opt(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from the process environment (§6). Returns
    /// [`SdForgeError::Configuration`] for missing required surfaces
    /// rather than panicking (§7 "never retried... never panics").
    pub fn from_env() -> Result<Self, SdForgeError> {
        let sd_basic_auth = match (env_opt("SD_BASIC_AUTH_USER"), env_opt("SD_BASIC_AUTH_PASSWORD")) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        };

        let auto_clean_method = match env_opt("AUTO_CLEAN_METHOD").as_deref() {
            Some("launches") => CleanupMethod::Launches,
            _ => CleanupMethod::Days,
        };

        let filter_type = match env_opt("NUDENET_FILTER_TYPE").as_deref() {
            Some("pixelation") => FilterType::Pixelation,
            Some("solid_fill") => FilterType::SolidFill,
            _ => FilterType::VariableBlur,
        };

        let mask_shape = match env_opt("NUDENET_MASK_SHAPE").as_deref() {
            Some("rectangle") => MaskShape::Rectangle,
            _ => MaskShape::Ellipse,
        };

        Ok(Self {
            sd_base_url: env_var("SD_BASE_URL")?,
            sd_basic_auth,
            image_output_path: env_opt("IMAGE_OUTPUT_PATH").unwrap_or_else(|| "images".to_string()),

            chat_provider: env_opt("CHAT_PROVIDER").unwrap_or_else(|| "anthropic".to_string()),
            chat_api_key: env_opt("CHAT_API_KEY"),
            chat_base_url: env_opt("CHAT_BASE_URL"),
            chat_model: env_opt("CHAT_MODEL"),
            chat_timeout: Duration::from_secs(env_u64("CHAT_TIMEOUT_SECS", 60)),
            image_assist_base_url: env_opt("IMAGE_ASSIST_BASE_URL"),
            image_assist_model: env_opt("IMAGE_ASSIST_MODEL"),

            hosting_base_url: env_opt("HOSTING_BASE_URL"),
            hosting_guest_api_key: env_opt("HOSTING_GUEST_API_KEY"),
            hosting_guest_album: env_opt("HOSTING_GUEST_ALBUM"),
            hosting_timeout: Duration::from_secs(env_u64("HOSTING_TIMEOUT_SECS", 30)),
            hosting_max_file_size: env_u64("HOSTING_MAX_FILE_SIZE_BYTES", 10 * 1024 * 1024) as usize,
            hosting_local_fallback: env_bool("HOSTING_LOCAL_FALLBACK", true),

            chat_rate_limit_per_minute: env_i64("CHAT_RATE_LIMIT_PER_MINUTE", 20),
            generation_rate_limit_per_minute: env_i64("GENERATION_RATE_LIMIT_PER_MINUTE", 5),
            admin_user_ids: env_opt("ADMIN_USER_IDS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default(),

            auto_clean_enabled: env_bool("AUTO_CLEAN_ENABLED", true),
            cleanup_policy: CleanupPolicy {
                method: auto_clean_method,
                threshold: env_i64("AUTO_CLEAN_THRESHOLD", 30),
                retain_days: env_i64("AUTO_CLEAN_RETAIN_DAYS", 30),
            },

            file_server_host: env_opt("FILE_SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            file_server_port: env_opt("FILE_SERVER_PORT").and_then(|v| v.parse().ok()).unwrap_or(8089),

            nsfw_filter_enabled: env_bool("NSFW_FILTER_ENABLED", true),
            censor: CensorConfig {
                thresholds: CensorThresholds {
                    face: env_f64("NUDENET_THRESHOLD_FACE", 1.0),
                    exposed_breast: env_f64("NUDENET_THRESHOLD_EXPOSED_BREAST", 0.5),
                    covered_breast: env_f64("NUDENET_THRESHOLD_COVERED_BREAST", 1.0),
                    exposed_buttocks: env_f64("NUDENET_THRESHOLD_EXPOSED_BUTTOCKS", 0.5),
                    exposed_genitalia: env_f64("NUDENET_THRESHOLD_EXPOSED_GENITALIA", 0.4),
                    exposed_feet: env_f64("NUDENET_THRESHOLD_EXPOSED_FEET", 1.0),
                    belly: env_f64("NUDENET_THRESHOLD_BELLY", 1.0),
                    armpits: env_f64("NUDENET_THRESHOLD_ARMPITS", 1.0),
                    back: env_f64("NUDENET_THRESHOLD_BACK", 1.0),
                    default: env_f64("NUDENET_THRESHOLD_DEFAULT", 1.0),
                },
                nms_threshold: env_f64("NUDENET_NMS_THRESHOLD", 0.5),
                filter_type,
                blur_radius: env_f64("NUDENET_BLUR_RADIUS", 25.0),
                pixelation_factor: env_u64("NUDENET_PIXELATION_FACTOR", 8) as u32,
                fill_color: env_opt("NUDENET_FILL_COLOR").unwrap_or_else(|| "#000000".to_string()),
                mask_shape,
                mask_blend_radius: env_f64("NUDENET_MASK_BLEND_RADIUS", 5.0),
                rectangle_rounding: env_f64("NUDENET_RECTANGLE_ROUNDING", 0.0),
                expansion_factor: env_f64("NUDENET_EXPANSION_FACTOR", 1.0),
            },

            conversation_db_path: env_opt("CONVERSATION_DB_PATH").unwrap_or_else(|| "sdforge_conversation.db".to_string()),
            lora_db_path: env_opt("LORA_DB_PATH").unwrap_or_else(|| "sdforge_lora.db".to_string()),
            credentials_db_path: env_opt("CREDENTIALS_DB_PATH").unwrap_or_else(|| "sdforge_credentials.db".to_string()),

            discord_token: env_opt("DISCORD_TOKEN"),
        })
    }

    /// The base URL the local file sink publishes image URLs under.
    #[must_use]
    pub fn local_base_url(&self) -> String {
        format!("http://{}:{}", self.file_server_host, self.file_server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases live in one test: `SD_BASE_URL` is process-global state,
    // and running these as separate `#[test]` fns would race under the
    // default parallel test runner.
    #[test]
    fn sd_base_url_gates_config_loading() {
        env::remove_var("SD_BASE_URL");
        let err = Config::from_env().unwrap_err();
        assert_eq!(err.kind(), "configuration");

        env::set_var("SD_BASE_URL", "http://localhost:7860");
        let config = Config::from_env().unwrap();
        assert_eq!(config.sd_base_url, "http://localhost:7860");
        assert_eq!(config.chat_provider, "anthropic");
        assert!(config.hosting_local_fallback);
        assert_eq!(config.local_base_url(), "http://0.0.0.0:8089");
        env::remove_var("SD_BASE_URL");
    }
}
