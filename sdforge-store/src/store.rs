//! [`ConversationStore`] — persisted chat history, personalities,
//! moderation, and rate limiting, all scoped per context key (§4.5).

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use sdforge_types::SdForgeError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::personalities::BUILTIN_PERSONALITIES;
use crate::types::{
    CleanupMethod, CleanupPolicy, CleanupReport, Message, ModerationStatus, Personality, RateCheck, Role,
    UserSettings,
};

/// Width of the rate-limit sliding window (§4.5 "Rate limiting").
const RATE_LIMIT_WINDOW_SECS: i64 = 60;

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, SdForgeError> {
    let metadata: String = row.get("metadata");
    Ok(Message {
        context_key: row.get("context_key"),
        user_id: row.get("user_id"),
        role: Role::parse(row.get::<&str, _>("role")),
        content: row.get("content"),
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        created_at: parse_timestamp(row.get("created_at")),
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Per-context chat state with personality and moderation (§4.5).
pub struct ConversationStore {
    pool: SqlitePool,
}

impl ConversationStore {
    /// Open (creating if absent) a SQLite-backed store, apply migrations,
    /// seed built-in personalities, record this launch, and run the
    /// auto-cleanup pass if `policy` says it's due.
    pub async fn open(path: &str, policy: CleanupPolicy) -> Result<Self, SdForgeError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| SdForgeError::Configuration(format!("invalid store path: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| SdForgeError::Configuration(format!("failed to open conversation store: {e}")))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| SdForgeError::Configuration(format!("conversation store migration failed: {e}")))?;

        let store = Self { pool };
        store.seed_personalities().await?;
        if let Err(err) = store.record_launch_and_maybe_cleanup(policy).await {
            // §7: "Auto-cleanup errors are logged and swallowed — they
            // must not crash startup."
            tracing::warn!(error = %err, "auto-cleanup pass failed");
        }
        Ok(store)
    }

    /// Build directly from an existing pool (tests). Does not seed
    /// personalities or run cleanup; call those explicitly if needed.
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn seed_personalities(&self) -> Result<(), SdForgeError> {
        for (name, system_prompt, image_injection_prompt) in BUILTIN_PERSONALITIES {
            sqlx::query(
                "INSERT INTO personalities (name, system_prompt, image_injection_prompt, builtin)
                 VALUES (?1, ?2, ?3, 1)
                 ON CONFLICT(name) DO NOTHING",
            )
            .bind(name)
            .bind(system_prompt)
            .bind(image_injection_prompt)
            .execute(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        }
        Ok(())
    }

    /// Look up a personality by name (§4.5).
    pub async fn get_personality(&self, name: &str) -> Result<Option<Personality>, SdForgeError> {
        let row = sqlx::query("SELECT * FROM personalities WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        Ok(row.map(|row| Personality {
            name: row.get("name"),
            system_prompt: row.get("system_prompt"),
            image_injection_prompt: row.get("image_injection_prompt"),
            builtin: row.get::<i64, _>("builtin") != 0,
        }))
    }

    /// List every registered personality (§6 tool surface).
    pub async fn list_personalities(&self) -> Result<Vec<Personality>, SdForgeError> {
        let rows = sqlx::query("SELECT * FROM personalities ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        Ok(rows
            .into_iter()
            .map(|row| Personality {
                name: row.get("name"),
                system_prompt: row.get("system_prompt"),
                image_injection_prompt: row.get("image_injection_prompt"),
                builtin: row.get::<i64, _>("builtin") != 0,
            })
            .collect())
    }

    /// Append a turn to a context's history (§4.5 `append`).
    pub async fn append(
        &self,
        context_key: &str,
        user_id: &str,
        role: Role,
        content: &str,
        metadata: serde_json::Value,
    ) -> Result<(), SdForgeError> {
        sqlx::query(
            "INSERT INTO messages (context_key, user_id, role, content, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(context_key)
        .bind(user_id)
        .bind(role.as_str())
        .bind(content)
        .bind(metadata.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        Ok(())
    }

    /// The most recent `limit` messages for a context, chronological
    /// ascending (§4.5 `history`, §8 context isolation).
    pub async fn history(&self, context_key: &str, limit: i64) -> Result<Vec<Message>, SdForgeError> {
        let rows = sqlx::query(
            "SELECT * FROM (
                SELECT * FROM messages WHERE context_key = ?1 ORDER BY id DESC LIMIT ?2
             ) ORDER BY id ASC",
        )
        .bind(context_key)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        rows.iter().map(row_to_message).collect()
    }

    /// Delete every message for a context, returning the count removed
    /// (§4.5 `clear`, §8 context isolation: never touches other contexts).
    pub async fn clear(&self, context_key: &str) -> Result<u64, SdForgeError> {
        let result = sqlx::query("DELETE FROM messages WHERE context_key = ?1")
            .bind(context_key)
            .execute(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        Ok(result.rows_affected())
    }

    /// Load a user's settings, creating defaults on first access (§4.5
    /// `get_settings`).
    pub async fn get_settings(&self, user_id: &str) -> Result<UserSettings, SdForgeError> {
        if let Some(row) = sqlx::query("SELECT * FROM user_settings WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?
        {
            return Ok(UserSettings {
                personality_name: row.get("personality_name"),
                locked_personality_name: row.get("locked_personality_name"),
                locked_by: row.get("locked_by"),
                max_context_messages: row.get("max_context_messages"),
            });
        }

        let defaults = UserSettings::default();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO user_settings
                (user_id, personality_name, max_context_messages, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(&defaults.personality_name)
        .bind(defaults.max_context_messages)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| SdForgeError::Internal(Box::new(e)))?;

        Ok(defaults)
    }

    /// Change a user's chosen personality. Refused when a lock is in
    /// effect (§4.5, §8 "Personality lock").
    pub async fn set_personality(&self, user_id: &str, name: &str) -> Result<(), SdForgeError> {
        let settings = self.get_settings(user_id).await?;
        if settings.locked_personality_name.is_some() {
            return Err(SdForgeError::Policy(format!(
                "personality is locked for user {user_id}"
            )));
        }
        if self.get_personality(name).await?.is_none() {
            return Err(SdForgeError::NotFound(format!("personality not found: {name}")));
        }

        sqlx::query(
            "UPDATE user_settings SET personality_name = ?1, updated_at = ?2 WHERE user_id = ?3",
        )
        .bind(name)
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        Ok(())
    }

    /// Admin-only: lock a user to a personality, overriding their own
    /// choice until unlocked (§4.5 `lock_personality`).
    pub async fn lock_personality(&self, user_id: &str, name: &str, admin_id: &str) -> Result<(), SdForgeError> {
        self.get_settings(user_id).await?; // ensures the row exists
        if self.get_personality(name).await?.is_none() {
            return Err(SdForgeError::NotFound(format!("personality not found: {name}")));
        }
        sqlx::query(
            "UPDATE user_settings
                SET locked_personality_name = ?1, locked_by = ?2, updated_at = ?3
             WHERE user_id = ?4",
        )
        .bind(name)
        .bind(admin_id)
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        Ok(())
    }

    async fn upsert_moderation_row(&self, user_id: &str) -> Result<(), SdForgeError> {
        sqlx::query("INSERT INTO moderation (user_id) VALUES (?1) ON CONFLICT(user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        Ok(())
    }

    /// Place a time-boxed restriction on a user (§4.5 `timeout_user`).
    pub async fn timeout_user(
        &self,
        user_id: &str,
        minutes: i64,
        reason: &str,
        admin_id: &str,
    ) -> Result<(), SdForgeError> {
        self.upsert_moderation_row(user_id).await?;
        let until = Utc::now() + Duration::minutes(minutes);
        sqlx::query(
            "UPDATE moderation
                SET timeout_until = ?1, timeout_reason = ?2, timeout_by = ?3
             WHERE user_id = ?4",
        )
        .bind(until.to_rfc3339())
        .bind(reason)
        .bind(admin_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        Ok(())
    }

    /// Place an indefinite restriction on a user (§4.5 `suspend_user`).
    pub async fn suspend_user(&self, user_id: &str, reason: &str, admin_id: &str) -> Result<(), SdForgeError> {
        self.upsert_moderation_row(user_id).await?;
        sqlx::query(
            "UPDATE moderation
                SET suspended = 1, suspended_reason = ?1, suspended_by = ?2
             WHERE user_id = ?3",
        )
        .bind(reason)
        .bind(admin_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        Ok(())
    }

    /// Current moderation status, lazily clearing an elapsed timeout
    /// (§4.5 `check_status`, §8 "Lazy timeout expiry").
    pub async fn check_status(&self, user_id: &str) -> Result<ModerationStatus, SdForgeError> {
        let Some(row) = sqlx::query("SELECT * FROM moderation WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?
        else {
            return Ok(ModerationStatus::Active);
        };

        if row.get::<i64, _>("suspended") != 0 {
            return Ok(ModerationStatus::Suspended { reason: row.get("suspended_reason") });
        }

        let timeout_until: Option<String> = row.get("timeout_until");
        if let Some(until_str) = timeout_until {
            let until = parse_timestamp(&until_str);
            if until > Utc::now() {
                return Ok(ModerationStatus::TimedOut { until, reason: row.get("timeout_reason") });
            }
            sqlx::query(
                "UPDATE moderation SET timeout_until = NULL, timeout_reason = NULL, timeout_by = NULL
                 WHERE user_id = ?1",
            )
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        }

        Ok(ModerationStatus::Active)
    }

    /// Check whether `action` may run for `user_id` without recording it
    /// (§4.5 `check_rate`, §8 "Rate-limit monotonicity").
    pub async fn check_rate(
        &self,
        user_id: &str,
        action: &str,
        max_per_minute: i64,
    ) -> Result<RateCheck, SdForgeError> {
        let now = Utc::now();
        let window_start = now - Duration::seconds(RATE_LIMIT_WINDOW_SECS);

        let count: i64 = sqlx::query(
            "SELECT COUNT(*) as c FROM rate_limit_events
             WHERE user_id = ?1 AND action = ?2 AND occurred_at >= ?3",
        )
        .bind(user_id)
        .bind(action)
        .bind(window_start.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SdForgeError::Internal(Box::new(e)))?
        .get("c");

        if count < max_per_minute {
            return Ok(RateCheck { allowed: true, seconds_until_reset: 0 });
        }

        let oldest: Option<String> = sqlx::query(
            "SELECT occurred_at FROM rate_limit_events
             WHERE user_id = ?1 AND action = ?2 AND occurred_at >= ?3
             ORDER BY occurred_at ASC LIMIT 1",
        )
        .bind(user_id)
        .bind(action)
        .bind(window_start.to_rfc3339())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SdForgeError::Internal(Box::new(e)))?
        .map(|row| row.get("occurred_at"));

        let seconds_until_reset = match oldest {
            Some(ts) => {
                let elapsed = now.signed_duration_since(parse_timestamp(&ts)).num_seconds();
                (RATE_LIMIT_WINDOW_SECS - elapsed).clamp(0, RATE_LIMIT_WINDOW_SECS)
            }
            None => 0,
        };

        Ok(RateCheck { allowed: false, seconds_until_reset })
    }

    /// Record that `action` happened, for future `check_rate` calls
    /// (§4.5 `record_action`).
    pub async fn record_action(&self, user_id: &str, action: &str, context_key: Option<&str>) -> Result<(), SdForgeError> {
        sqlx::query(
            "INSERT INTO rate_limit_events (user_id, action, context_key, occurred_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(user_id)
        .bind(action)
        .bind(context_key)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        Ok(())
    }

    /// Record a launch, and run the cleanup pass if `policy` says it's
    /// due (§4.5 "Auto-cleanup").
    pub async fn record_launch_and_maybe_cleanup(&self, policy: CleanupPolicy) -> Result<CleanupReport, SdForgeError> {
        let last_cleanup_launch = sqlx::query(
            "SELECT started_at FROM launches WHERE cleanup_performed = 1 ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SdForgeError::Internal(Box::new(e)))?;

        let launches_since: i64 = sqlx::query("SELECT COUNT(*) as c FROM launches")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?
            .get("c");

        let due = match (&last_cleanup_launch, policy.method) {
            (None, _) => false, // nothing to compare against yet
            (Some(row), CleanupMethod::Days) => {
                let started_at: String = row.get("started_at");
                let elapsed_days = (Utc::now() - parse_timestamp(&started_at)).num_days();
                elapsed_days > policy.threshold
            }
            (Some(_), CleanupMethod::Launches) => launches_since > policy.threshold,
        };

        let now = Utc::now().to_rfc3339();
        let insert_result = sqlx::query(
            "INSERT INTO launches (started_at, cleanup_performed) VALUES (?1, ?2)",
        )
        .bind(&now)
        .bind(due)
        .execute(&self.pool)
        .await
        .map_err(|e| SdForgeError::Internal(Box::new(e)))?;
        let launch_id = insert_result.last_insert_rowid();

        if !due {
            return Ok(CleanupReport::default());
        }

        let cutoff = Utc::now() - Duration::days(policy.retain_days);
        let deleted_messages = sqlx::query("DELETE FROM messages WHERE created_at < ?1")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?
            .rows_affected();

        let rate_cutoff = Utc::now() - Duration::hours(1);
        let deleted_rate_events = sqlx::query("DELETE FROM rate_limit_events WHERE occurred_at < ?1")
            .bind(rate_cutoff.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?
            .rows_affected();

        sqlx::query("UPDATE launches SET cleanup_performed = 1 WHERE id = ?1")
            .bind(launch_id)
            .execute(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?;

        tracing::info!(deleted_messages, deleted_rate_events, "auto-cleanup pass ran");
        Ok(CleanupReport {
            messages_deleted: deleted_messages,
            rate_limit_events_deleted: deleted_rate_events,
            ran: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> ConversationStore {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        let store = ConversationStore::from_pool(pool);
        store.seed_personalities().await.unwrap();
        store
    }

    #[tokio::test]
    async fn builtin_personalities_are_installed() {
        let store = test_store().await;
        let names: Vec<String> = store
            .list_personalities()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        for expected in ["default", "uwu", "sarcastic", "professional", "helpful", "creative"] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn context_isolation_clearing_one_does_not_affect_another() {
        let store = test_store().await;
        store.append("channel:A", "u1", Role::User, "hi a", serde_json::json!({})).await.unwrap();
        store.append("channel:B", "u1", Role::User, "hi b", serde_json::json!({})).await.unwrap();

        store.clear("channel:A").await.unwrap();

        assert!(store.history("channel:A", 10).await.unwrap().is_empty());
        assert_eq!(store.history("channel:B", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_is_chronological_ascending() {
        let store = test_store().await;
        store.append("dm:u1", "u1", Role::User, "first", serde_json::json!({})).await.unwrap();
        store.append("dm:u1", "u1", Role::Assistant, "second", serde_json::json!({})).await.unwrap();

        let history = store.history("dm:u1", 10).await.unwrap();
        assert_eq!(history[0].content, "first");
        assert_eq!(history[1].content, "second");
    }

    #[tokio::test]
    async fn personality_lock_refuses_user_change() {
        let store = test_store().await;
        store.get_settings("u1").await.unwrap();
        store.lock_personality("u1", "uwu", "admin").await.unwrap();

        let result = store.set_personality("u1", "sarcastic").await;
        assert!(result.is_err());

        let settings = store.get_settings("u1").await.unwrap();
        assert_eq!(settings.effective_personality(), "uwu");
    }

    #[tokio::test]
    async fn lazy_timeout_expiry_reports_active_once_elapsed() {
        let store = test_store().await;
        store.upsert_moderation_row("u1").await.unwrap();
        let already_elapsed = Utc::now() - Duration::seconds(1);
        sqlx::query("UPDATE moderation SET timeout_until = ?1, timeout_reason = 'test' WHERE user_id = 'u1'")
            .bind(already_elapsed.to_rfc3339())
            .execute(&store.pool)
            .await
            .unwrap();

        let status = store.check_status("u1").await.unwrap();
        assert_eq!(status, ModerationStatus::Active);
    }

    #[tokio::test]
    async fn active_timeout_is_reported_until_elapsed() {
        let store = test_store().await;
        store.timeout_user("u1", 10, "cooldown", "admin").await.unwrap();
        let status = store.check_status("u1").await.unwrap();
        assert!(matches!(status, ModerationStatus::TimedOut { .. }));
    }

    #[tokio::test]
    async fn rate_limit_denies_after_threshold_and_reports_reset_window() {
        let store = test_store().await;
        let now = Utc::now();

        for offset in [0i64, 10] {
            let ts = now - Duration::seconds(20 - offset);
            sqlx::query(
                "INSERT INTO rate_limit_events (user_id, action, occurred_at) VALUES ('u1', 'chat', ?1)",
            )
            .bind(ts.to_rfc3339())
            .execute(&store.pool)
            .await
            .unwrap();
        }

        let check = store.check_rate("u1", "chat", 2).await.unwrap();
        assert!(!check.allowed);
        assert!(check.seconds_until_reset >= 0 && check.seconds_until_reset <= 60);
    }

    #[tokio::test]
    async fn rate_limit_allows_under_threshold() {
        let store = test_store().await;
        store.record_action("u1", "chat", None).await.unwrap();
        let check = store.check_rate("u1", "chat", 2).await.unwrap();
        assert!(check.allowed);
    }

    #[tokio::test]
    async fn auto_cleanup_is_idempotent_within_a_launch() {
        let store = test_store().await;
        let old = Utc::now() - Duration::days(60);
        store.append("dm:u1", "u1", Role::User, "old message", serde_json::json!({})).await.unwrap();
        sqlx::query("UPDATE messages SET created_at = ?1")
            .bind(old.to_rfc3339())
            .execute(&store.pool)
            .await
            .unwrap();

        // Seed a prior cleanup-marked launch far enough in the past to
        // trip the days-based policy.
        sqlx::query("INSERT INTO launches (started_at, cleanup_performed) VALUES (?1, 1)")
            .bind((Utc::now() - Duration::days(60)).to_rfc3339())
            .execute(&store.pool)
            .await
            .unwrap();

        let policy = CleanupPolicy { method: CleanupMethod::Days, threshold: 30, retain_days: 30 };
        let first = store.record_launch_and_maybe_cleanup(policy).await.unwrap();
        assert!(first.ran);
        assert_eq!(first.messages_deleted, 1);

        let second = store.record_launch_and_maybe_cleanup(policy).await.unwrap();
        assert!(second.messages_deleted <= first.messages_deleted);
    }
}
