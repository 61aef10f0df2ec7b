//! Outlet API endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::{error, revision, success, written, ApiResult};
use crate::auth::Session;
use crate::errors::AppError;
use crate::models::{CreateOutletRequest, Outlet, UpdateOutletRequest};
use crate::notify::{ChangeEvent, ChangeTable};
use crate::AppState;

/// GET /api/outlets - List all outlets.
pub async fn list_outlets(State(state): State<AppState>) -> ApiResult<Vec<Outlet>> {
    let revision_id = revision(&state).await;

    match state.repo.list_outlets().await {
        Ok(outlets) => success(outlets, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/outlets/:id - Get a single outlet.
pub async fn get_outlet(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Outlet> {
    let revision_id = revision(&state).await;

    match state.repo.get_outlet(&id).await {
        Ok(Some(outlet)) => success(outlet, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Outlet {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/outlets - Create an outlet (admin).
pub async fn create_outlet(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreateOutletRequest>,
) -> ApiResult<Outlet> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    if request.name.trim().is_empty() {
        return error(
            AppError::Validation("Outlet name is required".to_string()),
            revision_id,
        );
    }

    match state.repo.create_outlet(&request).await {
        Ok(outlet) => {
            state
                .hub
                .publish(ChangeEvent::insert(ChangeTable::Outlets, &outlet.id, &outlet));
            written(&state, outlet, revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/outlets/:id - Update an outlet (admin).
pub async fn update_outlet(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(request): Json<UpdateOutletRequest>,
) -> ApiResult<Outlet> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    match state.repo.update_outlet(&id, &request).await {
        Ok(outlet) => {
            state
                .hub
                .publish(ChangeEvent::modified(ChangeTable::Outlets, &id, &outlet));
            written(&state, outlet, revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/outlets/:id - Delete an outlet (admin).
pub async fn delete_outlet(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    match state.repo.delete_outlet(&id).await {
        Ok(()) => {
            state.hub.publish(ChangeEvent::delete(ChangeTable::Outlets, &id));
            written(&state, (), revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}
