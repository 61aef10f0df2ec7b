//! Staff profile API endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::{error, revision, success, written, ApiResult};
use crate::auth::Session;
use crate::errors::AppError;
use crate::models::{CreateStaffRequest, Role, StaffMember, UpdateStaffRequest};
use crate::notify::{ChangeEvent, ChangeTable};
use crate::AppState;

/// GET /api/staff - List staff members (admin).
pub async fn list_staff(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Vec<StaffMember>> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    match state.repo.list_staff().await {
        Ok(staff) => success(staff, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/staff/:id - Get a staff member. Staff may read their own profile.
pub async fn get_staff(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<StaffMember> {
    let revision_id = revision(&state).await;
    if !session.is_admin() && session.staff_id.as_deref() != Some(id.as_str()) {
        return error(
            AppError::Forbidden("You can only view your own profile".to_string()),
            revision_id,
        );
    }

    match state.repo.get_staff(&id).await {
        Ok(Some(member)) => success(member, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Staff {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/staff - Create a staff profile for a staff account (admin).
pub async fn create_staff(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreateStaffRequest>,
) -> ApiResult<StaffMember> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    if request.employee_id.trim().is_empty() {
        return error(
            AppError::Validation("Employee ID is required".to_string()),
            revision_id,
        );
    }
    match state.repo.get_user(&request.user_id).await {
        Ok(Some(user)) if user.role == Role::Staff => {}
        Ok(Some(_)) => {
            return error(
                AppError::Validation("Staff profiles belong to staff accounts".to_string()),
                revision_id,
            )
        }
        Ok(None) => {
            return error(
                AppError::Validation(format!("User {} does not exist", request.user_id)),
                revision_id,
            )
        }
        Err(e) => return error(e, revision_id),
    }

    match state.repo.create_staff(&request).await {
        Ok(member) => {
            state.hub.publish(ChangeEvent::insert(
                ChangeTable::StaffProfiles,
                &member.profile.id,
                &member,
            ));
            written(&state, member, revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/staff/:id - Update a staff profile (admin).
pub async fn update_staff(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(request): Json<UpdateStaffRequest>,
) -> ApiResult<StaffMember> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    match state.repo.update_staff(&id, &request).await {
        Ok(member) => {
            state
                .hub
                .publish(ChangeEvent::modified(ChangeTable::StaffProfiles, &id, &member));
            written(&state, member, revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/staff/:id - Delete a staff profile with its assignments and schedules (admin).
pub async fn delete_staff(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    match state.repo.delete_staff(&id).await {
        Ok(()) => {
            state
                .hub
                .publish(ChangeEvent::delete(ChangeTable::StaffProfiles, &id));
            written(&state, (), revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}
