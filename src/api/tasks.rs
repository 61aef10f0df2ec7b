//! Task template API endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::{error, revision, success, written, ApiResult};
use crate::auth::Session;
use crate::errors::AppError;
use crate::models::{validate_task_fields, CreateTaskRequest, Task, UpdateTaskRequest};
use crate::notify::{ChangeEvent, ChangeTable};
use crate::AppState;

/// GET /api/tasks - List all tasks.
pub async fn list_tasks(State(state): State<AppState>) -> ApiResult<Vec<Task>> {
    let revision_id = revision(&state).await;

    match state.repo.list_tasks().await {
        Ok(tasks) => success(tasks, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/tasks/:id - Get a single task.
pub async fn get_task(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Task> {
    let revision_id = revision(&state).await;

    match state.repo.get_task(&id).await {
        Ok(Some(task)) => success(task, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Task {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/tasks - Create a task (admin).
pub async fn create_task(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<Task> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    if let Err(message) = validate_task_fields(
        &request.title,
        request.estimated_minutes,
        request.is_recurring,
        request.recurring_pattern,
    ) {
        return error(AppError::Validation(message), revision_id);
    }

    match state.repo.create_task(&request, Some(&session.user_id)).await {
        Ok(task) => {
            state
                .hub
                .publish(ChangeEvent::insert(ChangeTable::Tasks, &task.id, &task));
            written(&state, task, revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/tasks/:id - Update a task (admin).
pub async fn update_task(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(request): Json<UpdateTaskRequest>,
) -> ApiResult<Task> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    let before = match state.repo.get_task(&id).await {
        Ok(Some(task)) => task,
        Ok(None) => {
            return error(
                AppError::NotFound(format!("Task {} not found", id)),
                revision_id,
            )
        }
        Err(e) => return error(e, revision_id),
    };

    match state.repo.update_task(&id, &request).await {
        Ok(task) => {
            state
                .hub
                .publish(ChangeEvent::update(ChangeTable::Tasks, &id, &before, &task));
            written(&state, task, revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/tasks/:id - Delete a task and its assignments (admin).
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    match state.repo.delete_task(&id).await {
        Ok(()) => {
            state.hub.publish(ChangeEvent::delete(ChangeTable::Tasks, &id));
            written(&state, (), revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}
