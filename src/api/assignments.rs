//! Task assignment API endpoints.
//!
//! Admins see and edit everything. Staff and outlet accounts see the
//! assignments addressed to them, and may complete them or ask to move
//! their due date.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::NaiveDate;

use super::{error, revision, success, written, ApiResult};
use crate::auth::Session;
use crate::db::NewAssignment;
use crate::errors::AppError;
use crate::models::{
    AssignmentChanges, AssignmentFilter, AssignmentStatus, AssignmentView,
    CompleteAssignmentRequest, CreateAssignmentRequest, RescheduleRequest, Role, SweepResult,
    UpdateAssignmentRequest,
};
use crate::notify::{ChangeEvent, ChangeTable};
use crate::status::is_past_due;
use crate::sweep::sweep_overdue;
use crate::AppState;

/// GET /api/assignments - List assignments visible to the caller.
pub async fn list_assignments(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(filter): Query<AssignmentFilter>,
) -> ApiResult<Vec<AssignmentView>> {
    let revision_id = revision(&state).await;

    match visible_assignments(&state, &session, filter).await {
        Ok(views) => success(views, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/assignments/:id - Get a single assignment.
pub async fn get_assignment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<AssignmentView> {
    let revision_id = revision(&state).await;

    match load_view(&state, &id).await {
        Ok(view) if session.can_view(&view.assignment) => success(view, revision_id),
        Ok(_) => error(not_yours(&id), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/assignments - Assign a task (admin).
pub async fn create_assignment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreateAssignmentRequest>,
) -> ApiResult<AssignmentView> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    match create(&state, &request).await {
        Ok(view) => {
            state.hub.publish(ChangeEvent::insert(
                ChangeTable::TaskAssignments,
                &view.assignment.id,
                &view,
            ));
            written(&state, view, revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/assignments/:id - Edit an assignment (admin).
pub async fn update_assignment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(request): Json<UpdateAssignmentRequest>,
) -> ApiResult<AssignmentView> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    let result = async {
        let before = load_view(&state, &id).await?;
        let mut changes = AssignmentChanges {
            staff_id: request.staff_id.clone(),
            outlet_id: request.outlet_id.clone(),
            due_date: request
                .due_date
                .map(|d| d.resolve(state.calendar.timezone())),
            status: request.status,
            minutes_deducted: request.minutes_deducted,
            expected_version: request.expected_version,
        };

        if let Some(due) = changes.due_date {
            let due_day = state.calendar.local_date(due);
            check_due_after_assigned(
                state.calendar.local_date(before.assignment.assigned_date),
                due_day,
            )?;
            // Moving an overdue assignment to a future day clears the flag.
            if changes.status.is_none()
                && before.assignment.status == AssignmentStatus::Overdue
                && !is_past_due(due_day, state.calendar.today())
            {
                changes.status = Some(AssignmentStatus::Pending);
            }
        }
        if matches!(changes.minutes_deducted, Some(m) if m < 0) {
            return Err(AppError::Validation(
                "Minutes deducted cannot be negative".to_string(),
            ));
        }

        state.repo.update_assignment(&id, &changes).await?;
        Ok::<_, AppError>((before, load_view(&state, &id).await?))
    }
    .await;

    publish_update(&state, result, revision_id).await
}

/// DELETE /api/assignments/:id - Delete an assignment (admin).
pub async fn delete_assignment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    match state.repo.delete_assignment(&id).await {
        Ok(()) => {
            state
                .hub
                .publish(ChangeEvent::delete(ChangeTable::TaskAssignments, &id));
            written(&state, (), revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/assignments/:id/complete - Submit completion proof.
pub async fn complete_assignment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(request): Json<CompleteAssignmentRequest>,
) -> ApiResult<AssignmentView> {
    let revision_id = revision(&state).await;

    let result = async {
        let before = load_view(&state, &id).await?;
        if !session.is_admin() && !session.owns(&before.assignment) {
            return Err(not_yours(&id));
        }
        let proof_url = request.proof_url.trim();
        if proof_url.is_empty() {
            return Err(AppError::Validation(
                "Completion proof (proofUrl) is required".to_string(),
            ));
        }

        let notes = request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        state.repo.complete_assignment(&id, proof_url, notes).await?;
        Ok::<_, AppError>((before, load_view(&state, &id).await?))
    }
    .await;

    publish_update(&state, result, revision_id).await
}

/// POST /api/assignments/:id/reschedule - Ask for a new due date.
pub async fn request_reschedule(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(request): Json<RescheduleRequest>,
) -> ApiResult<AssignmentView> {
    let revision_id = revision(&state).await;

    let result = async {
        let before = load_view(&state, &id).await?;
        if !session.owns(&before.assignment) {
            return Err(not_yours(&id));
        }
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation(
                "A reason is required to reschedule".to_string(),
            ));
        }

        let requested = request
            .requested_due_date
            .resolve(state.calendar.timezone());
        if state.calendar.local_date(requested) < state.calendar.today() {
            return Err(AppError::Validation(
                "Requested due date cannot be in the past".to_string(),
            ));
        }

        state.repo.request_reschedule(&id, requested, reason).await?;
        Ok::<_, AppError>((before, load_view(&state, &id).await?))
    }
    .await;

    publish_update(&state, result, revision_id).await
}

/// POST /api/assignments/:id/reschedule/approve - Accept the requested date (admin).
pub async fn approve_reschedule(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<AssignmentView> {
    resolve_reschedule(state, session, id, true).await
}

/// POST /api/assignments/:id/reschedule/reject - Keep the current date (admin).
pub async fn reject_reschedule(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<AssignmentView> {
    resolve_reschedule(state, session, id, false).await
}

/// POST /api/assignments/sweep-overdue - Run the overdue sweep now (admin).
pub async fn trigger_sweep(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<SweepResult> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    match sweep_overdue(&state.repo, &state.calendar, &state.hub).await {
        Ok(result) => written(&state, result, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

async fn resolve_reschedule(
    state: AppState,
    session: Session,
    id: String,
    approve: bool,
) -> ApiResult<AssignmentView> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    let result = async {
        let before = load_view(&state, &id).await?;
        state.repo.resolve_reschedule(&id, approve).await?;
        Ok::<_, AppError>((before, load_view(&state, &id).await?))
    }
    .await;

    publish_update(&state, result, revision_id).await
}

/// Narrow `filter` to what the session may see; `None` means nothing.
pub(super) fn scope_filter(session: &Session, mut filter: AssignmentFilter) -> Option<AssignmentFilter> {
    match session.role {
        Role::Admin => {}
        Role::Staff => filter.staff_id = Some(session.staff_id.clone()?),
        Role::Outlet => filter.outlet_id = Some(session.outlet_id.clone()?),
    }
    Some(filter)
}

async fn visible_assignments(
    state: &AppState,
    session: &Session,
    filter: AssignmentFilter,
) -> Result<Vec<AssignmentView>, AppError> {
    let Some(filter) = scope_filter(session, filter) else {
        return Ok(Vec::new());
    };

    let today = state.calendar.today();
    let rows = state.repo.list_assignments(&filter).await?;
    Ok(rows
        .into_iter()
        .map(|row| state.calendar.view(row.assignment, today, Some(row.task_title)))
        .collect())
}

async fn create(
    state: &AppState,
    request: &CreateAssignmentRequest,
) -> Result<AssignmentView, AppError> {
    let staff_id = non_blank(&request.staff_id);
    let outlet_id = non_blank(&request.outlet_id);
    if staff_id.is_none() && outlet_id.is_none() {
        return Err(AppError::Validation(
            "An assignment needs a staffId or an outletId".to_string(),
        ));
    }
    if state.repo.get_task(&request.task_id).await?.is_none() {
        return Err(AppError::Validation(format!(
            "Task {} does not exist",
            request.task_id
        )));
    }

    let tz = state.calendar.timezone();
    let assigned_date = request
        .assigned_date
        .map(|d| d.resolve(tz))
        .unwrap_or_else(chrono::Utc::now);
    let due_date = request.due_date.resolve(tz);
    check_due_after_assigned(
        state.calendar.local_date(assigned_date),
        state.calendar.local_date(due_date),
    )?;

    let assignment = state
        .repo
        .create_assignment(&NewAssignment {
            task_id: request.task_id.clone(),
            staff_id,
            outlet_id,
            assigned_date,
            due_date,
        })
        .await?;

    load_view(state, &assignment.id).await
}

async fn load_view(state: &AppState, id: &str) -> Result<AssignmentView, AppError> {
    let row = state
        .repo
        .get_assignment(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Assignment {} not found", id)))?;
    Ok(state
        .calendar
        .view(row.assignment, state.calendar.today(), Some(row.task_title)))
}

async fn publish_update(
    state: &AppState,
    result: Result<(AssignmentView, AssignmentView), AppError>,
    revision_id: i64,
) -> ApiResult<AssignmentView> {
    match result {
        Ok((before, after)) => {
            state.hub.publish(ChangeEvent::update(
                ChangeTable::TaskAssignments,
                &after.assignment.id,
                &before,
                &after,
            ));
            written(state, after, revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}

fn check_due_after_assigned(assigned: NaiveDate, due: NaiveDate) -> Result<(), AppError> {
    if due < assigned {
        return Err(AppError::Validation(format!(
            "Due date {} is before the assigned date {}",
            due, assigned
        )));
    }
    Ok(())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn not_yours(id: &str) -> AppError {
    AppError::Forbidden(format!("Assignment {} is not assigned to you", id))
}
