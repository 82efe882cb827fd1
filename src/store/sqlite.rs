use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use sqlx::{QueryBuilder, Sqlite};

use super::{Store, TASK_COLUMNS, USER_COLUMNS};
use crate::error::Error;
use crate::models::{NewTask, Task, TaskPatch, User};

/// Embedded single-file store. Dates and times live in TEXT columns as
/// ISO-8601; the sqlx chrono codecs keep them symmetric with Postgres.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        Ok(SqliteStore { pool })
    }

    pub fn new(pool: SqlitePool) -> Self {
        SqliteStore { pool }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn ensure_schema(&self) -> Result<(), Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                token TEXT,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'todo',
                due_date TEXT,
                start_date TEXT,
                start_time TEXT,
                end_time TEXT,
                actual_start_time TEXT,
                actual_end_time TEXT,
                completed_items TEXT,
                pending_items TEXT,
                user_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        // A tasks table from an older deployment may predate some of the
        // optional columns; add whatever is missing, never drop or rename.
        let existing: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('tasks')")
                .fetch_all(&self.pool)
                .await?;
        for (column, column_type) in [
            ("due_date", "TEXT"),
            ("start_date", "TEXT"),
            ("start_time", "TEXT"),
            ("end_time", "TEXT"),
            ("actual_start_time", "TEXT"),
            ("actual_end_time", "TEXT"),
            ("completed_items", "TEXT"),
            ("pending_items", "TEXT"),
            ("user_id", "INTEGER"),
            ("updated_at", "TEXT"),
        ] {
            if !existing.iter().any(|name| name == column) {
                let sql = format!("ALTER TABLE tasks ADD COLUMN {column} {column_type}");
                sqlx::query(&sql).execute(&self.pool).await?;
            }
        }

        Ok(())
    }

    async fn find_user_by_token(&self, token: &str) -> Result<Option<User>, Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE token = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, Error> {
        let result =
            sqlx::query("INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)")
                .bind(username)
                .bind(password_hash)
                .bind(Utc::now())
                .execute(&self.pool)
                .await;
        let result = match result {
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(Error::Conflict("username already exists".into()));
            }
            other => other?,
        };

        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn set_user_token(&self, user_id: i64, token: &str) -> Result<(), Error> {
        sqlx::query("UPDATE users SET token = ? WHERE id = ?")
            .bind(token)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_tasks(&self, user_id: i64) -> Result<Vec<Task>, Error> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ? ORDER BY id DESC");
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    async fn get_task(&self, user_id: i64, task_id: i64) -> Result<Option<Task>, Error> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ? AND user_id = ?");
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(task_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn create_task(&self, user_id: i64, task: NewTask) -> Result<Task, Error> {
        let result = sqlx::query(
            "INSERT INTO tasks (title, description, status, due_date, start_date, start_time, \
             end_time, actual_start_time, actual_end_time, completed_items, pending_items, \
             user_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
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
        .execute(&self.pool)
        .await?;

        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ? AND user_id = ?");
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(result.last_insert_rowid())
            .bind(user_id)
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

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE tasks SET ");
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
        let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
            .bind(task_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
