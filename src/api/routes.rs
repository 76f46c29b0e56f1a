//! Request handlers for the task board API.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::models::client::{Client, NewClient};
use crate::models::task::{NewTask, Task, TaskPatch, TaskSource};
use crate::{AppError, Result};

use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::ApiState;

/// Optional filters for `GET /api/tasks`.
#[derive(Debug, Default, Deserialize)]
pub struct TaskFilter {
    /// Only return tasks inferred from this channel.
    pub source: Option<TaskSource>,
}

/// Liveness probe.
pub async fn health() -> &'static str {
    "ok"
}

/// List tasks, optionally filtered by source.
///
/// # Errors
///
/// Returns `AppError::InvalidInput` for an unknown source and
/// `AppError::Db` if the query fails.
pub async fn list_tasks(
    State(state): State<ApiState>,
    ApiQuery(filter): ApiQuery<TaskFilter>,
) -> Result<Json<Vec<Task>>> {
    let tasks = match filter.source {
        Some(source) => state.tasks.list_by_source(source).await?,
        None => state.tasks.list_all().await?,
    };
    Ok(Json(tasks))
}

/// Create a manual task. Manual entries never carry a source.
///
/// # Errors
///
/// Returns `AppError::InvalidInput` for a blank title.
pub async fn create_task(
    State(state): State<ApiState>,
    ApiJson(mut body): ApiJson<NewTask>,
) -> Result<(StatusCode, Json<Task>)> {
    let title = body.title.trim();
    if title.is_empty() {
        return Err(AppError::InvalidInput("title must not be empty".into()));
    }
    body.title = title.to_owned();
    body.source = None;

    let task = state.tasks.create(&body).await?;
    info!(task_id = task.id, "manual task created");
    Ok((StatusCode::CREATED, Json(task)))
}

/// Apply a partial update to a task.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown id and
/// `AppError::InvalidInput` if the patch blanks the title.
pub async fn update_task(
    State(state): State<ApiState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(patch): ApiJson<TaskPatch>,
) -> Result<Json<Task>> {
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::InvalidInput("title must not be empty".into()));
    }
    Ok(Json(state.tasks.update(id, patch).await?))
}

/// Delete a task.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown id.
pub async fn delete_task(
    State(state): State<ApiState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode> {
    state.tasks.delete(id).await?;
    info!(task_id = id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// List registered clients.
///
/// # Errors
///
/// Returns `AppError::Db` if the query fails.
pub async fn list_clients(State(state): State<ApiState>) -> Result<Json<Vec<Client>>> {
    Ok(Json(state.clients.list_all().await?))
}

/// Register a client.
///
/// # Errors
///
/// Returns `AppError::InvalidInput` for a blank name and
/// `AppError::Conflict` for a duplicate Slack id or email.
pub async fn register_client(
    State(state): State<ApiState>,
    ApiJson(body): ApiJson<NewClient>,
) -> Result<(StatusCode, Json<Client>)> {
    if body.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name must not be empty".into()));
    }
    let client = state.clients.register(&body).await?;
    info!(client_id = client.id, "client registered");
    Ok((StatusCode::CREATED, Json(client)))
}
