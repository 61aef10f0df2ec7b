//! Monthly schedule API endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};

use super::{error, revision, success, written, ApiResult};
use crate::auth::Session;
use crate::errors::AppError;
use crate::models::{
    validate_schedule, CreateScheduleRequest, MonthlySchedule, Role, ScheduleQuery,
    UpdateScheduleDaysRequest,
};
use crate::notify::{ChangeEvent, ChangeTable};
use crate::AppState;

/// GET /api/schedules?month&year[&staffId] - Schedules of a month.
///
/// Staff only ever see their own schedule.
pub async fn list_schedules(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<ScheduleQuery>,
) -> ApiResult<Vec<MonthlySchedule>> {
    let revision_id = revision(&state).await;

    let staff_id = match session.role {
        Role::Admin | Role::Outlet => query.staff_id,
        Role::Staff => match session.staff_id {
            Some(own) => Some(own),
            None => return success(Vec::new(), revision_id),
        },
    };

    match state
        .repo
        .list_schedules(query.month, query.year, staff_id.as_deref())
        .await
    {
        Ok(schedules) => success(schedules, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/schedules/:id - Get a schedule with its days.
pub async fn get_schedule(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<MonthlySchedule> {
    let revision_id = revision(&state).await;

    match state.repo.get_schedule(&id).await {
        Ok(Some(schedule)) => {
            if session.role == Role::Staff
                && session.staff_id.as_deref() != Some(schedule.staff_id.as_str())
            {
                return error(
                    AppError::Forbidden("You can only view your own schedule".to_string()),
                    revision_id,
                );
            }
            success(schedule, revision_id)
        }
        Ok(None) => error(
            AppError::NotFound(format!("Schedule {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/schedules - Create a monthly schedule (admin).
pub async fn create_schedule(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreateScheduleRequest>,
) -> ApiResult<MonthlySchedule> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    if let Err(message) = validate_schedule(request.month, request.year, &request.days) {
        return error(AppError::Validation(message), revision_id);
    }

    match state.repo.create_schedule(&request).await {
        Ok(schedule) => {
            state.hub.publish(ChangeEvent::insert(
                ChangeTable::MonthlySchedules,
                &schedule.id,
                &schedule,
            ));
            written(&state, schedule, revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/schedules/:id/days - Replace individual days (admin).
pub async fn update_schedule_days(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(request): Json<UpdateScheduleDaysRequest>,
) -> ApiResult<MonthlySchedule> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    let before = match state.repo.get_schedule(&id).await {
        Ok(Some(schedule)) => schedule,
        Ok(None) => {
            return error(
                AppError::NotFound(format!("Schedule {} not found", id)),
                revision_id,
            )
        }
        Err(e) => return error(e, revision_id),
    };

    if let Err(message) = validate_schedule(before.month, before.year, &request.days) {
        return error(AppError::Validation(message), revision_id);
    }

    match state.repo.update_schedule_days(&id, &request.days).await {
        Ok(schedule) => {
            state.hub.publish(ChangeEvent::update(
                ChangeTable::MonthlySchedules,
                &id,
                &before,
                &schedule,
            ));
            written(&state, schedule, revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/schedules/:id - Delete a schedule (admin).
pub async fn delete_schedule(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    match state.repo.delete_schedule(&id).await {
        Ok(()) => {
            state
                .hub
                .publish(ChangeEvent::delete(ChangeTable::MonthlySchedules, &id));
            written(&state, (), revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}
