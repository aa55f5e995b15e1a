//! Conversation, personality, and moderation types (§4.5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message's role (§4.6 also uses this shape for LLM messages).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A system/personality prompt.
    System,
    /// The end user.
    User,
    /// The assistant's reply.
    Assistant,
}

impl Role {
    /// Parse from the string stored in `messages.role`.
    pub fn parse(s: &str) -> Self {
        match s {
            "system" => Role::System,
            "assistant" => Role::Assistant,
            _ => Role::User,
        }
    }

    /// The string stored in `messages.role`.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A persisted conversation turn (§4.5 `append`/`history`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The isolated conversation surface this message belongs to.
    pub context_key: String,
    /// The user who authored (or, for assistant turns, is addressed by) it.
    pub user_id: String,
    /// Who said it.
    pub role: Role,
    /// The text content.
    pub content: String,
    /// Free-form metadata (e.g. which personality was active).
    pub metadata: serde_json::Value,
    /// When it was appended.
    pub created_at: DateTime<Utc>,
}

/// Per-user preferences (§4.5 `get_settings`).
#[derive(Debug, Clone, PartialEq)]
pub struct UserSettings {
    /// The user's chosen personality.
    pub personality_name: String,
    /// If set, overrides `personality_name` and refuses user changes.
    pub locked_personality_name: Option<String>,
    /// Admin who applied the lock, if any.
    pub locked_by: Option<String>,
    /// Bound on how many recent messages `history` returns.
    pub max_context_messages: i64,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            personality_name: "default".to_string(),
            locked_personality_name: None,
            locked_by: None,
            max_context_messages: 20,
        }
    }
}

impl UserSettings {
    /// The personality actually in effect: the lock if present, else the
    /// user's choice (§4.5 "Load personality (locked if set, else user's
    /// chosen)").
    #[must_use]
    pub fn effective_personality(&self) -> &str {
        self.locked_personality_name
            .as_deref()
            .unwrap_or(&self.personality_name)
    }
}

/// A named chat persona (§4.5 "Personalities").
#[derive(Debug, Clone, PartialEq)]
pub struct Personality {
    /// Unique name, e.g. `"uwu"`.
    pub name: String,
    /// Prepended to chat turns (§4.8 step 5).
    pub system_prompt: String,
    /// Prepended when composing an image-assist enhancement (§4.8 step 4).
    pub image_injection_prompt: String,
    /// Whether this came from the built-in set.
    pub builtin: bool,
}

/// The result of `check_status` (§4.5, §4.8 step 1).
#[derive(Debug, Clone, PartialEq)]
pub enum ModerationStatus {
    /// No active restriction.
    Active,
    /// Account-level suspension with no automatic expiry.
    Suspended {
        /// Why, if recorded.
        reason: Option<String>,
    },
    /// Time-boxed restriction, expires on its own (§8 lazy expiry).
    TimedOut {
        /// When the restriction lifts.
        until: DateTime<Utc>,
        /// Why, if recorded.
        reason: Option<String>,
    },
}

/// Outcome of a rate-limit check (§4.5 `check_rate`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateCheck {
    /// Whether the action may proceed.
    pub allowed: bool,
    /// Seconds until the window next has capacity; in `[0, 60]`.
    pub seconds_until_reset: i64,
}

/// Auto-cleanup trigger condition (§4.5 "Auto-cleanup").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupMethod {
    /// Trigger when more than `threshold` days have elapsed since the
    /// last cleanup-marked launch.
    Days,
    /// Trigger when more than `threshold` launches have occurred since.
    Launches,
}

/// Configuration for the startup auto-cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanupPolicy {
    /// Which counter drives the trigger.
    pub method: CleanupMethod,
    /// How many days/launches may elapse before cleanup fires.
    pub threshold: i64,
    /// Messages older than this are deleted once cleanup fires.
    pub retain_days: i64,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self { method: CleanupMethod::Days, threshold: 30, retain_days: 30 }
    }
}

/// Rows deleted by a cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanupReport {
    /// Conversation messages removed.
    pub messages_deleted: u64,
    /// Rate-limit events removed.
    pub rate_limit_events_deleted: u64,
    /// Whether a cleanup pass actually ran this launch.
    pub ran: bool,
}
