use chrono::Utc;
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;

use taskflow_server::error::Error;
use taskflow_server::models::{NewTask, TaskPatch};
use taskflow_server::store::{SqliteStore, Store};

// In-memory SQLite vanishes per connection, so the pool is pinned to one.
async fn memory_pool() -> sqlx::SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

async fn memory_store() -> SqliteStore {
    let store = SqliteStore::new(memory_pool().await);
    store.ensure_schema().await.unwrap();
    store
}

fn new_task(title: &str) -> NewTask {
    NewTask::from_value(&json!({ "title": title })).unwrap()
}

#[tokio::test]
async fn ensure_schema_is_idempotent() {
    let store = memory_store().await;
    let user = store.create_user("alice", "hash").await.unwrap();

    store.ensure_schema().await.unwrap();
    store.ensure_schema().await.unwrap();

    let found = store.find_user_by_username("alice").await.unwrap().unwrap();
    assert_eq!(found.id, user.id);
}

#[tokio::test]
async fn ensure_schema_adds_missing_columns_to_legacy_tables() {
    let pool = memory_pool().await;
    sqlx::query(
        "CREATE TABLE tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'todo',
            created_at TEXT NOT NULL
        )",
    )
    .execute(&pool)
    .await
    .unwrap();

    let store = SqliteStore::new(pool);
    store.ensure_schema().await.unwrap();

    let user = store.create_user("alice", "hash").await.unwrap();
    let task = store.create_task(user.id, new_task("Buy milk")).await.unwrap();
    assert_eq!(task.title, "Buy milk");
    assert!(task.actual_start_time.is_none());
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let store = memory_store().await;
    store.create_user("alice", "hash").await.unwrap();

    let err = store.create_user("alice", "other-hash").await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn token_lookup_follows_rotation() {
    let store = memory_store().await;
    let user = store.create_user("alice", "hash").await.unwrap();

    store.set_user_token(user.id, "first").await.unwrap();
    let found = store.find_user_by_token("first").await.unwrap().unwrap();
    assert_eq!(found.username, "alice");

    store.set_user_token(user.id, "second").await.unwrap();
    assert!(store.find_user_by_token("first").await.unwrap().is_none());
    assert!(store.find_user_by_token("second").await.unwrap().is_some());
}

#[tokio::test]
async fn create_applies_defaults() {
    let store = memory_store().await;
    let user = store.create_user("alice", "hash").await.unwrap();

    let task = store.create_task(user.id, new_task("Buy milk")).await.unwrap();
    assert_eq!(task.status, "todo");
    assert_eq!(task.start_date, Some(Utc::now().date_naive()));
    assert!(task.start_time.is_some());
    assert!(task.updated_at.is_none());
    assert_eq!(task.user_id, user.id);
}

#[tokio::test]
async fn list_is_newest_first_and_owner_scoped() {
    let store = memory_store().await;
    let alice = store.create_user("alice", "hash").await.unwrap();
    let bob = store.create_user("bob", "hash").await.unwrap();

    let first = store.create_task(alice.id, new_task("first")).await.unwrap();
    let second = store.create_task(alice.id, new_task("second")).await.unwrap();
    store.create_task(bob.id, new_task("bob's")).await.unwrap();

    let tasks = store.list_tasks(alice.id).await.unwrap();
    assert_eq!(
        tasks.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );
}

#[tokio::test]
async fn other_users_tasks_are_invisible() {
    let store = memory_store().await;
    let alice = store.create_user("alice", "hash").await.unwrap();
    let bob = store.create_user("bob", "hash").await.unwrap();
    let task = store.create_task(alice.id, new_task("private")).await.unwrap();

    assert!(store.get_task(bob.id, task.id).await.unwrap().is_none());
    let patch = TaskPatch::from_value(&json!({ "status": "done" })).unwrap();
    assert!(
        store
            .update_task(bob.id, task.id, patch)
            .await
            .unwrap()
            .is_none()
    );
    assert!(!store.delete_task(bob.id, task.id).await.unwrap());

    // Still untouched for the owner.
    let still = store.get_task(alice.id, task.id).await.unwrap().unwrap();
    assert_eq!(still.status, "todo");
}

#[tokio::test]
async fn partial_update_touches_only_supplied_fields() {
    let store = memory_store().await;
    let user = store.create_user("alice", "hash").await.unwrap();
    let task = store
        .create_task(
            user.id,
            NewTask::from_value(&json!({
                "title": "Buy milk",
                "description": "2 liters",
                "startTime": "09:30",
            }))
            .unwrap(),
        )
        .await
        .unwrap();

    let patch = TaskPatch::from_value(&json!({ "status": "done" })).unwrap();
    let updated = store
        .update_task(user.id, task.id, patch)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.status, "done");
    assert_eq!(updated.title, "Buy milk");
    assert_eq!(updated.description.as_deref(), Some("2 liters"));
    assert_eq!(updated.start_time, task.start_time);
    assert!(updated.updated_at.is_some());
}

#[tokio::test]
async fn update_can_clear_a_nullable_field() {
    let store = memory_store().await;
    let user = store.create_user("alice", "hash").await.unwrap();
    let task = store
        .create_task(
            user.id,
            NewTask::from_value(&json!({ "title": "Buy milk", "due_date": "2025-06-09" })).unwrap(),
        )
        .await
        .unwrap();
    assert!(task.due_date.is_some());

    let patch = TaskPatch::from_value(&json!({ "due_date": null })).unwrap();
    let updated = store
        .update_task(user.id, task.id, patch)
        .await
        .unwrap()
        .unwrap();
    assert!(updated.due_date.is_none());
}

#[tokio::test]
async fn empty_patch_is_rejected() {
    let store = memory_store().await;
    let user = store.create_user("alice", "hash").await.unwrap();
    let task = store.create_task(user.id, new_task("Buy milk")).await.unwrap();

    let err = store
        .update_task(user.id, task.id, TaskPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn delete_reports_whether_a_row_was_removed() {
    let store = memory_store().await;
    let user = store.create_user("alice", "hash").await.unwrap();
    let task = store.create_task(user.id, new_task("Buy milk")).await.unwrap();

    assert!(store.delete_task(user.id, task.id).await.unwrap());
    assert!(!store.delete_task(user.id, task.id).await.unwrap());
    assert!(!store.delete_task(user.id, 9999).await.unwrap());
}

#[tokio::test]
async fn optional_tracking_fields_round_trip() {
    let store = memory_store().await;
    let user = store.create_user("alice", "hash").await.unwrap();
    let task = store
        .create_task(
            user.id,
            NewTask::from_value(&json!({
                "title": "Review",
                "actualStartTime": "10:05",
                "completedItems": "intro section",
            }))
            .unwrap(),
        )
        .await
        .unwrap();

    let fetched = store.get_task(user.id, task.id).await.unwrap().unwrap();
    assert_eq!(
        fetched.actual_start_time.map(|t| t.to_string()),
        Some("10:05:00".to_string())
    );
    assert_eq!(fetched.completed_items.as_deref(), Some("intro section"));
}
