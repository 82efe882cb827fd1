use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, QueryBuilder};

use super::{Store, TASK_COLUMNS, USER_COLUMNS};
use crate::error::Error;
use crate::models::{NewTask, Task, TaskPatch, User};

/// Networked store for production deployments.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(PgStore { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ensure_schema(&self) -> Result<(), Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                token TEXT,
                created_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tasks (
                id BIGSERIAL PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'todo',
                due_date DATE,
                start_date DATE,
                start_time TIME,
                end_time TIME,
                actual_start_time TIME,
                actual_end_time TIME,
                completed_items TEXT,
                pending_items TEXT,
                user_id BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ
            )",
        )
        .execute(&self.pool)
        .await?;

        // Additive migration for tables created before the optional columns
        // existed. ADD COLUMN IF NOT EXISTS makes the pass idempotent.
        for (column, column_type) in [
            ("due_date", "DATE"),
            ("start_date", "DATE"),
            ("start_time", "TIME"),
            ("end_time", "TIME"),
            ("actual_start_time", "TIME"),
            ("actual_end_time", "TIME"),
            ("completed_items", "TEXT"),
            ("pending_items", "TEXT"),
            ("user_id", "BIGINT"),
            ("updated_at", "TIMESTAMPTZ"),
        ] {
            let sql = format!("ALTER TABLE tasks ADD COLUMN IF NOT EXISTS {column} {column_type}");
            sqlx::query(&sql).execute(&self.pool).await?;
        }

        Ok(())
    }

    async fn find_user_by_token(&self, token: &str) -> Result<Option<User>, Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE token = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, Error> {
        let sql = format!(
            "INSERT INTO users (username, password_hash, created_at) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        );
        let result = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .bind(password_hash)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await;
        match result {
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(Error::Conflict("username already exists".into()))
            }
            other => Ok(other?),
        }
    }

    async fn set_user_token(&self, user_id: i64, token: &str) -> Result<(), Error> {
        sqlx::query("UPDATE users SET token = $1 WHERE id = $2")
            .bind(token)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_tasks(&self, user_id: i64) -> Result<Vec<Task>, Error> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = $1 ORDER BY id DESC");
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    async fn get_task(&self, user_id: i64, task_id: i64) -> Result<Option<Task>, Error> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND user_id = $2");
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(task_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn create_task(&self, user_id: i64, task: NewTask) -> Result<Task, Error> {
        let sql = format!(
            "INSERT INTO tasks (title, description, status, due_date, start_date, start_time, \
             end_time, actual_start_time, actual_end_time, completed_items, pending_items, \
             user_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {TASK_COLUMNS}"
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(&task.title)
            .bind(&task.description)
            .bind(&task.status)
            .bind(task.due_date)
            .bind(task.start_date)
            .bind(task.start_time)
            .bind(task.end_time)
            .bind(task.actual_start_time)
            .bind(task.actual_end_time)
            .bind(&task.completed_items)
            .bind(&task.pending_items)
            .bind(user_id)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        Ok(task)
    }

    async fn update_task(
        &self,
        user_id: i64,
        task_id: i64,
        patch: TaskPatch,
    ) -> Result<Option<Task>, Error> {
        if patch.is_empty() {
            return Err(Error::validation("no fields to update"));
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE tasks SET ");
        {
            let mut set = builder.separated(", ");
            if let Some(title) = patch.title {
                set.push("title = ").push_bind_unseparated(title);
            }
            if let Some(description) = patch.description {
                set.push("description = ").push_bind_unseparated(description);
            }
            if let Some(status) = patch.status {
                set.push("status = ").push_bind_unseparated(status);
            }
            if let Some(due_date) = patch.due_date {
                set.push("due_date = ").push_bind_unseparated(due_date);
            }
            if let Some(start_date) = patch.start_date {
                set.push("start_date = ").push_bind_unseparated(start_date);
            }
            if let Some(start_time) = patch.start_time {
                set.push("start_time = ").push_bind_unseparated(start_time);
            }
            if let Some(end_time) = patch.end_time {
                set.push("end_time = ").push_bind_unseparated(end_time);
            }
            if let Some(actual_start_time) = patch.actual_start_time {
                set.push("actual_start_time = ")
                    .push_bind_unseparated(actual_start_time);
            }
            if let Some(actual_end_time) = patch.actual_end_time {
                set.push("actual_end_time = ")
                    .push_bind_unseparated(actual_end_time);
            }
            if let Some(completed_items) = patch.completed_items {
                set.push("completed_items = ")
                    .push_bind_unseparated(completed_items);
            }
            if let Some(pending_items) = patch.pending_items {
                set.push("pending_items = ")
                    .push_bind_unseparated(pending_items);
            }
            set.push("updated_at = ").push_bind_unseparated(Utc::now());
        }
        builder.push(" WHERE id = ");
        builder.push_bind(task_id);
        builder.push(" AND user_id = ");
        builder.push_bind(user_id);

        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_task(user_id, task_id).await
    }

    async fn delete_task(&self, user_id: i64, task_id: i64) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(task_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
