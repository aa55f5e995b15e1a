//! [`CredentialStore`]: per-user `HostedUser` credentials and upload
//! history (§3 "UploadRouter owns `HostedUser` and upload history").
//!
//! Credentials are stored in plaintext — a deliberate, documented
//! operator-facing limitation (§4.7, §9), not an oversight.

use std::str::FromStr;

use chrono::Utc;
use sdforge_types::SdForgeError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::types::HostedUser;

/// Owns the `hosted_users` and `upload_history` tables backing
/// [`crate::UploadRouter`]'s per-user credential lookup.
pub struct CredentialStore {
    pool: SqlitePool,
}

impl CredentialStore {
    /// Open (creating if absent) the SQLite file at `path` and run
    /// migrations.
    pub async fn open(path: &str) -> Result<Self, SdForgeError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| SdForgeError::Configuration(format!("invalid upload store path: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| SdForgeError::Configuration(format!("failed to open upload store: {e}")))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| SdForgeError::Configuration(format!("upload store migration failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Wrap an already-open pool (tests, shared-pool setups).
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up a user's stored external-host credential, if any.
    pub async fn get(&self, user_id: &str) -> Result<Option<HostedUser>, SdForgeError> {
        let row = sqlx::query("SELECT user_id, api_key, default_album FROM hosted_users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?;

        Ok(row.map(|row| HostedUser {
            user_id: row.get("user_id"),
            api_key: row.get("api_key"),
            default_album: row.get("default_album"),
        }))
    }

    /// Store or replace a user's external-host credential.
    pub async fn set(
        &self,
        user_id: &str,
        api_key: &str,
        default_album: Option<&str>,
    ) -> Result<(), SdForgeError> {
        sqlx::query(
            "INSERT INTO hosted_users (user_id, api_key, default_album, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET api_key = excluded.api_key, default_album = excluded.default_album",
        )
        .bind(user_id)
        .bind(api_key)
        .bind(default_album)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| SdForgeError::Internal(Box::new(e)))?;

        Ok(())
    }

    /// Forget a user's stored credential.
    pub async fn remove(&self, user_id: &str) -> Result<(), SdForgeError> {
        sqlx::query("DELETE FROM hosted_users WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| SdForgeError::Internal(Box::new(e)))?;

        Ok(())
    }

    /// Record a completed upload in history.
    pub(crate) async fn record_history(
        &self,
        user_id: Option<&str>,
        sink: &str,
        url: &str,
        deletion_handle: Option<&str>,
    ) -> Result<(), SdForgeError> {
        sqlx::query(
            "INSERT INTO upload_history (id, user_id, sink, url, deletion_handle, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(sink)
        .bind(url)
        .bind(deletion_handle)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| SdForgeError::Internal(Box::new(e)))?;

        Ok(())
    }

    /// Most recent uploads, newest first, for a user (or all users when
    /// `user_id` is `None`).
    pub async fn history(&self, user_id: Option<&str>, limit: i64) -> Result<Vec<(String, String)>, SdForgeError> {
        let rows = match user_id {
            Some(user_id) => {
                sqlx::query("SELECT sink, url FROM upload_history WHERE user_id = ? ORDER BY created_at DESC LIMIT ?")
                    .bind(user_id)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT sink, url FROM upload_history ORDER BY created_at DESC LIMIT ?")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| SdForgeError::Internal(Box::new(e)))?;

        Ok(rows.into_iter().map(|row| (row.get("sink"), row.get("url"))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> CredentialStore {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        CredentialStore::from_pool(pool)
    }

    #[tokio::test]
    async fn stored_credential_round_trips() {
        let store = test_store().await;
        store.set("u1", "key-123", Some("album-a")).await.unwrap();

        let found = store.get("u1").await.unwrap().unwrap();
        assert_eq!(found.api_key, "key-123");
        assert_eq!(found.default_album.as_deref(), Some("album-a"));
    }

    #[tokio::test]
    async fn unknown_user_has_no_credential() {
        let store = test_store().await;
        assert!(store.get("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn setting_twice_replaces_the_credential() {
        let store = test_store().await;
        store.set("u1", "old-key", None).await.unwrap();
        store.set("u1", "new-key", Some("album-b")).await.unwrap();

        let found = store.get("u1").await.unwrap().unwrap();
        assert_eq!(found.api_key, "new-key");
        assert_eq!(found.default_album.as_deref(), Some("album-b"));
    }

    #[tokio::test]
    async fn removed_credential_falls_back_to_none() {
        let store = test_store().await;
        store.set("u1", "key", None).await.unwrap();
        store.remove("u1").await.unwrap();
        assert!(store.get("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_records_most_recent_first() {
        let store = test_store().await;
        store.record_history(Some("u1"), "local", "http://x/1.png", None).await.unwrap();
        store.record_history(Some("u1"), "personal", "http://x/2.png", Some("del-1")).await.unwrap();

        let history = store.history(Some("u1"), 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].0, "personal");
    }
}
