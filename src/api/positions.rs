//! Position API endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::{error, revision, success, written, ApiResult};
use crate::auth::Session;
use crate::errors::AppError;
use crate::models::{CreatePositionRequest, Position};
use crate::notify::{ChangeEvent, ChangeTable};
use crate::AppState;

/// GET /api/positions - List all positions.
pub async fn list_positions(State(state): State<AppState>) -> ApiResult<Vec<Position>> {
    let revision_id = revision(&state).await;

    match state.repo.list_positions().await {
        Ok(positions) => success(positions, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/positions - Create a position (admin).
pub async fn create_position(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreatePositionRequest>,
) -> ApiResult<Position> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    if request.name.trim().is_empty() {
        return error(
            AppError::Validation("Position name is required".to_string()),
            revision_id,
        );
    }

    match state.repo.create_position(&request).await {
        Ok(position) => {
            state
                .hub
                .publish(ChangeEvent::insert(ChangeTable::Positions, &position.id, &position));
            written(&state, position, revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/positions/:id - Delete a position (admin).
pub async fn delete_position(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    match state.repo.delete_position(&id).await {
        Ok(()) => {
            state.hub.publish(ChangeEvent::delete(ChangeTable::Positions, &id));
            written(&state, (), revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}
