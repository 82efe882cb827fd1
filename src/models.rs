use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub token: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A task row as persisted. Scheduling and tracking columns are nullable in
/// both backends; timestamps are always bound from Rust so SQLite (TEXT) and
/// Postgres (DATE/TIME/TIMESTAMPTZ) decode to the same shapes.
#[derive(Debug, Clone, FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub actual_start_time: Option<NaiveTime>,
    pub actual_end_time: Option<NaiveTime>,
    pub completed_items: Option<String>,
    pub pending_items: Option<String>,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields for a new task, already validated and defaulted.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub actual_start_time: Option<NaiveTime>,
    pub actual_end_time: Option<NaiveTime>,
    pub completed_items: Option<String>,
    pub pending_items: Option<String>,
}

/// A partial update. `None` leaves a column untouched; the inner `Option`
/// distinguishes "set to a value" from "clear to NULL" for nullable columns.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
    pub start_date: Option<Option<NaiveDate>>,
    pub start_time: Option<Option<NaiveTime>>,
    pub end_time: Option<Option<NaiveTime>>,
    pub actual_start_time: Option<Option<NaiveTime>>,
    pub actual_end_time: Option<Option<NaiveTime>>,
    pub completed_items: Option<Option<String>>,
    pub pending_items: Option<Option<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.due_date.is_none()
            && self.start_date.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.actual_start_time.is_none()
            && self.actual_end_time.is_none()
            && self.completed_items.is_none()
            && self.pending_items.is_none()
    }
}
