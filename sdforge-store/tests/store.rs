use sdforge_store::{context_key, CleanupMethod, CleanupPolicy, ConversationStore, Role};
use sqlx::sqlite::SqlitePoolOptions;

async fn open_store() -> ConversationStore {
    let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    ConversationStore::from_pool(pool)
}

#[tokio::test]
async fn full_turn_round_trips_through_history() {
    let store = open_store().await;
    let key = context_key(Some("g"), Some("c"), None, "u1");

    store.append(&key, "u1", Role::User, "hello", serde_json::json!({})).await.unwrap();
    store
        .append(&key, "u1", Role::Assistant, "hi there", serde_json::json!({"personality": "default"}))
        .await
        .unwrap();

    let history = store.history(&key, 20).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].role, Role::Assistant);
}

#[tokio::test]
async fn cleanup_policy_by_launches_is_respected() {
    let store = open_store().await;
    let policy = CleanupPolicy { method: CleanupMethod::Launches, threshold: 2, retain_days: 1 };

    let first = store.record_launch_and_maybe_cleanup(policy).await.unwrap();
    assert!(!first.ran, "no prior cleanup-marked launch to compare against yet");
}
