//! Translation between wire-shaped JSON and persisted rows.
//!
//! The HTTP clients of this service speak camelCase for the scheduling
//! fields while the database columns are snake_case. Inbound bodies are
//! normalized against a fixed alias table before validation; outbound rows
//! carry both spellings so either style of client keeps working.

use chrono::{NaiveDate, NaiveTime, SecondsFormat, Timelike, Utc};
use serde_json::{Map, Value, json};

use crate::error::Error;
use crate::models::{NewTask, Task, TaskPatch};

/// Aliased input key -> canonical column name. Canonical wins when a body
/// carries both spellings.
const FIELD_ALIASES: &[(&str, &str)] = &[
    ("date", "start_date"),
    ("startTime", "start_time"),
    ("endTime", "end_time"),
    ("actualStartTime", "actual_start_time"),
    ("actualEndTime", "actual_end_time"),
    ("completedItems", "completed_items"),
    ("pendingItems", "pending_items"),
];

/// Folds aliased keys into their canonical names, dropping the alias. An
/// already-present canonical key is left untouched.
fn normalize_aliases(body: &mut Map<String, Value>) {
    for (alias, canonical) in FIELD_ALIASES {
        if let Some(value) = body.remove(*alias) {
            body.entry((*canonical).to_string()).or_insert(value);
        }
    }
}

fn as_object(body: &Value) -> Result<Map<String, Value>, Error> {
    let mut map = body
        .as_object()
        .cloned()
        .ok_or_else(|| Error::validation("expected a JSON object"))?;
    normalize_aliases(&mut map);
    Ok(map)
}

fn opt_string(key: &str, value: &Value) -> Result<Option<String>, Error> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(Error::validation(format!("{key} must be a string"))),
    }
}

fn opt_date(key: &str, value: &Value) -> Result<Option<NaiveDate>, Error> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .ok()
            .map(Some)
            .ok_or_else(|| Error::validation(format!("{key} must be a YYYY-MM-DD date"))),
        _ => Err(Error::validation(format!("{key} must be a YYYY-MM-DD date"))),
    }
}

fn opt_time(key: &str, value: &Value) -> Result<Option<NaiveTime>, Error> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => parse_time(s.trim())
            .map(Some)
            .ok_or_else(|| Error::validation(format!("{key} must be an HH:MM or HH:MM:SS time"))),
        _ => Err(Error::validation(format!(
            "{key} must be an HH:MM or HH:MM:SS time"
        ))),
    }
}

// Frontends send HH:MM, the stores round-trip HH:MM:SS.
fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

impl NewTask {
    /// Validates and defaults a create-task body. `title` is required;
    /// `status` falls back to `"todo"`; `start_date`/`start_time` fall back
    /// to the current UTC date and time when the caller sent neither the
    /// canonical nor the aliased key.
    pub fn from_value(body: &Value) -> Result<NewTask, Error> {
        let map = as_object(body)?;

        let title = map
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::validation("title is required"))?
            .to_string();

        let status = match map.get("status") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Null) | None => "todo".to_string(),
            Some(Value::String(_)) => "todo".to_string(),
            Some(_) => return Err(Error::validation("status must be a string")),
        };

        let get = |key: &str| map.get(key).unwrap_or(&Value::Null);
        let now = Utc::now();

        Ok(NewTask {
            title,
            description: opt_string("description", get("description"))?,
            status,
            due_date: opt_date("due_date", get("due_date"))?,
            start_date: opt_date("start_date", get("start_date"))?.unwrap_or(now.date_naive()),
            start_time: opt_time("start_time", get("start_time"))?
                .unwrap_or_else(|| now.time().with_nanosecond(0).unwrap_or(now.time())),
            end_time: opt_time("end_time", get("end_time"))?,
            actual_start_time: opt_time("actual_start_time", get("actual_start_time"))?,
            actual_end_time: opt_time("actual_end_time", get("actual_end_time"))?,
            completed_items: opt_string("completed_items", get("completed_items"))?,
            pending_items: opt_string("pending_items", get("pending_items"))?,
        })
    }
}

impl TaskPatch {
    /// Builds a partial update from an update-task body. Only keys present in
    /// the body (canonical or aliased) are touched; a body with no recognized
    /// field is rejected.
    pub fn from_value(body: &Value) -> Result<TaskPatch, Error> {
        let map = as_object(body)?;
        let mut patch = TaskPatch::default();

        if let Some(value) = map.get("title") {
            let title = value
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| Error::validation("title must be a non-empty string"))?;
            patch.title = Some(title.to_string());
        }
        if let Some(value) = map.get("status") {
            let status = value
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| Error::validation("status must be a non-empty string"))?;
            patch.status = Some(status.to_string());
        }
        if let Some(value) = map.get("description") {
            patch.description = Some(opt_string("description", value)?);
        }
        if let Some(value) = map.get("due_date") {
            patch.due_date = Some(opt_date("due_date", value)?);
        }
        if let Some(value) = map.get("start_date") {
            patch.start_date = Some(opt_date("start_date", value)?);
        }
        if let Some(value) = map.get("start_time") {
            patch.start_time = Some(opt_time("start_time", value)?);
        }
        if let Some(value) = map.get("end_time") {
            patch.end_time = Some(opt_time("end_time", value)?);
        }
        if let Some(value) = map.get("actual_start_time") {
            patch.actual_start_time = Some(opt_time("actual_start_time", value)?);
        }
        if let Some(value) = map.get("actual_end_time") {
            patch.actual_end_time = Some(opt_time("actual_end_time", value)?);
        }
        if let Some(value) = map.get("completed_items") {
            patch.completed_items = Some(opt_string("completed_items", value)?);
        }
        if let Some(value) = map.get("pending_items") {
            patch.pending_items = Some(opt_string("pending_items", value)?);
        }

        if patch.is_empty() {
            return Err(Error::validation("no fields to update"));
        }
        Ok(patch)
    }
}

/// Shapes a stored task for the wire: `id` becomes a string, dates and times
/// become ISO-8601 strings, a `date` field is derived from `start_date` (or
/// `due_date`), and every snake_case scheduling field present is mirrored
/// under its camelCase alias. Null columns are omitted.
pub fn to_wire(task: &Task) -> Value {
    let mut map = Map::new();
    map.insert("id".into(), json!(task.id.to_string()));
    map.insert("title".into(), json!(task.title));
    if let Some(description) = &task.description {
        map.insert("description".into(), json!(description));
    }
    map.insert("status".into(), json!(task.status));
    if let Some(due_date) = task.due_date {
        map.insert("due_date".into(), json!(due_date.format("%Y-%m-%d").to_string()));
    }
    if let Some(start_date) = task.start_date {
        map.insert(
            "start_date".into(),
            json!(start_date.format("%Y-%m-%d").to_string()),
        );
    }
    for (key, time) in [
        ("start_time", task.start_time),
        ("end_time", task.end_time),
        ("actual_start_time", task.actual_start_time),
        ("actual_end_time", task.actual_end_time),
    ] {
        if let Some(time) = time {
            map.insert(key.into(), json!(time.format("%H:%M:%S").to_string()));
        }
    }
    if let Some(completed_items) = &task.completed_items {
        map.insert("completed_items".into(), json!(completed_items));
    }
    if let Some(pending_items) = &task.pending_items {
        map.insert("pending_items".into(), json!(pending_items));
    }
    map.insert("user_id".into(), json!(task.user_id));
    map.insert(
        "created_at".into(),
        json!(task.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    if let Some(updated_at) = task.updated_at {
        map.insert(
            "updated_at".into(),
            json!(updated_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
    }

    if !map.contains_key("date") {
        if let Some(date) = map.get("start_date").or_else(|| map.get("due_date")) {
            map.insert("date".into(), date.clone());
        }
    }
    for (alias, canonical) in FIELD_ALIASES {
        if *alias == "date" {
            continue;
        }
        if let Some(value) = map.get(*canonical) {
            map.insert((*alias).to_string(), value.clone());
        }
    }

    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn sample_task() -> Task {
        Task {
            id: 7,
            title: "Buy milk".into(),
            description: None,
            status: "todo".into(),
            due_date: None,
            start_date: Some(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()),
            start_time: Some(NaiveTime::from_hms_opt(14, 0, 0).unwrap()),
            end_time: None,
            actual_start_time: None,
            actual_end_time: None,
            completed_items: None,
            pending_items: None,
            user_id: 3,
            created_at: "2025-06-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap(),
            updated_at: None,
        }
    }

    #[test]
    fn wire_mirrors_times_under_both_spellings() {
        let wire = to_wire(&sample_task());
        assert_eq!(wire["start_time"], "14:00:00");
        assert_eq!(wire["startTime"], "14:00:00");
        assert!(wire.get("end_time").is_none());
        assert!(wire.get("endTime").is_none());
    }

    #[test]
    fn wire_serializes_id_as_string() {
        let wire = to_wire(&sample_task());
        assert_eq!(wire["id"], "7");
    }

    #[test]
    fn wire_derives_date_from_start_date_then_due_date() {
        let wire = to_wire(&sample_task());
        assert_eq!(wire["date"], "2025-06-01");

        let mut task = sample_task();
        task.start_date = None;
        task.due_date = Some(NaiveDate::from_ymd_opt(2025, 6, 9).unwrap());
        let wire = to_wire(&task);
        assert_eq!(wire["date"], "2025-06-09");

        task.due_date = None;
        let wire = to_wire(&task);
        assert!(wire.get("date").is_none());
    }

    #[test]
    fn wire_omits_null_columns() {
        let wire = to_wire(&sample_task());
        assert!(wire.get("description").is_none());
        assert!(wire.get("updated_at").is_none());
    }

    #[test]
    fn new_task_requires_title() {
        let err = NewTask::from_value(&json!({"description": "no title"})).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = NewTask::from_value(&json!({"title": "  "})).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn new_task_defaults_status_and_schedule() {
        let task = NewTask::from_value(&json!({"title": "Buy milk"})).unwrap();
        assert_eq!(task.status, "todo");
        assert_eq!(task.start_date, Utc::now().date_naive());
        assert_eq!(task.start_time.nanosecond(), 0);
    }

    #[test]
    fn new_task_accepts_aliased_keys() {
        let task = NewTask::from_value(&json!({
            "title": "Standup",
            "date": "2025-06-02",
            "startTime": "09:30",
            "endTime": "09:45:00",
        }))
        .unwrap();
        assert_eq!(task.start_date, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        assert_eq!(task.start_time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(task.end_time, Some(NaiveTime::from_hms_opt(9, 45, 0).unwrap()));
    }

    #[test]
    fn canonical_key_wins_over_alias() {
        let task = NewTask::from_value(&json!({
            "title": "Standup",
            "start_date": "2025-06-02",
            "date": "1999-01-01",
        }))
        .unwrap();
        assert_eq!(task.start_date, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
    }

    #[test]
    fn patch_rejects_empty_field_set() {
        let err = TaskPatch::from_value(&json!({})).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = TaskPatch::from_value(&json!({"unknown": 1})).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn patch_distinguishes_clear_from_untouched() {
        let patch = TaskPatch::from_value(&json!({"due_date": null, "status": "done"})).unwrap();
        assert_eq!(patch.due_date, Some(None));
        assert_eq!(patch.status.as_deref(), Some("done"));
        assert!(patch.start_date.is_none());
    }

    #[test]
    fn patch_rejects_bad_time() {
        let err = TaskPatch::from_value(&json!({"start_time": "25:99"})).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
