//! HTTP dispatch. Thin by design: every handler normalizes input, calls the
//! store, shapes the output, and nothing else.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, CurrentUser};
use crate::error::Error;
use crate::models::{NewTask, TaskPatch};
use crate::store::Store;
use crate::wire;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
}

pub fn router(store: Arc<dyn Store>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/init", post(init))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { store })
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// Manual schema re-run; the same pass already happens at startup.
async fn init(State(state): State<AppState>) -> Result<(StatusCode, Json<Value>), Error> {
    state.store.ensure_schema().await?;
    Ok((StatusCode::CREATED, Json(json!({ "status": "initialized" }))))
}

async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, Error> {
    let tasks = state.store.list_tasks(user.id).await?;
    Ok(Json(Value::Array(tasks.iter().map(wire::to_wire).collect())))
}

async fn create_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), Error> {
    let draft = NewTask::from_value(&body)?;
    let task = state.store.create_task(user.id, draft).await?;
    Ok((StatusCode::CREATED, Json(wire::to_wire(&task))))
}

async fn get_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<i64>,
) -> Result<Json<Value>, Error> {
    let task = state
        .store
        .get_task(user.id, task_id)
        .await?
        .ok_or(Error::NotFound)?;
    Ok(Json(wire::to_wire(&task)))
}

async fn update_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Error> {
    let patch = TaskPatch::from_value(&body)?;
    let task = state
        .store
        .update_task(user.id, task_id, patch)
        .await?
        .ok_or(Error::NotFound)?;
    Ok(Json(wire::to_wire(&task)))
}

async fn delete_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<i64>,
) -> Result<Json<Value>, Error> {
    if state.store.delete_task(user.id, task_id).await? {
        Ok(Json(json!({ "status": "deleted" })))
    } else {
        Err(Error::NotFound)
    }
}
