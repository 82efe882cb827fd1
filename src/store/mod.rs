//! Persistence layer: one interface, two backends.
//!
//! The embedded SQLite store covers local and single-box deployments; the
//! Postgres store covers networked deployments. Handlers only ever see
//! `Arc<dyn Store>`; the backend is picked from the connection string scheme
//! at startup.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;
use crate::models::{NewTask, Task, TaskPatch, User};

mod postgres;
mod sqlite;

pub use postgres::PgStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Creates the `users` and `tasks` tables if absent and adds any missing
    /// optional columns. Idempotent; only ever additive.
    async fn ensure_schema(&self) -> Result<(), Error>;

    async fn find_user_by_token(&self, token: &str) -> Result<Option<User>, Error>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, Error>;
    /// Fails with [`Error::Conflict`] when the username is already taken.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, Error>;
    /// Overwrites the stored token, invalidating any previous one.
    async fn set_user_token(&self, user_id: i64, token: &str) -> Result<(), Error>;

    /// All tasks owned by `user_id`, newest first.
    async fn list_tasks(&self, user_id: i64) -> Result<Vec<Task>, Error>;
    async fn get_task(&self, user_id: i64, task_id: i64) -> Result<Option<Task>, Error>;
    async fn create_task(&self, user_id: i64, task: NewTask) -> Result<Task, Error>;
    /// Applies the supplied fields and stamps `updated_at`. `None` means no
    /// row matched both `task_id` and `user_id`.
    async fn update_task(
        &self,
        user_id: i64,
        task_id: i64,
        patch: TaskPatch,
    ) -> Result<Option<Task>, Error>;
    /// True when a row owned by `user_id` was removed.
    async fn delete_task(&self, user_id: i64, task_id: i64) -> Result<bool, Error>;
}

const TASK_COLUMNS: &str = "id, title, description, status, due_date, start_date, start_time, \
     end_time, actual_start_time, actual_end_time, completed_items, pending_items, user_id, \
     created_at, updated_at";

const USER_COLUMNS: &str = "id, username, password_hash, token, created_at";

pub async fn connect(database_url: &str) -> anyhow::Result<Arc<dyn Store>> {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok(Arc::new(PgStore::connect(database_url).await?))
    } else {
        Ok(Arc::new(SqliteStore::connect(database_url).await?))
    }
}
