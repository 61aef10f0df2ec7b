//! Dashboard and report endpoints.

use axum::{extract::State, Extension};

use super::assignments::scope_filter;
use super::{error, revision, success, written, ApiResult};
use crate::auth::Session;
use crate::errors::AppError;
use crate::models::{AssignmentFilter, DashboardSummary, LeaderboardEntry};
use crate::reports::{leaderboard, tally};
use crate::status::DisplayStatus;
use crate::sweep::sweep_overdue;
use crate::AppState;

/// GET /api/dashboard - Status counts and today's work for the caller.
///
/// Runs the overdue sweep first so the stored statuses are current.
pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<DashboardSummary> {
    let revision_id = revision(&state).await;

    match dashboard(&state, &session).await {
        Ok(summary) => written(&state, summary, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/reports/leaderboard - Per-staff completion statistics (admin).
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Vec<LeaderboardEntry>> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    let result = async {
        let staff = state.repo.list_staff().await?;
        let today = state.calendar.today();
        let views: Vec<_> = state
            .repo
            .list_assignments(&AssignmentFilter::default())
            .await?
            .into_iter()
            .map(|row| state.calendar.view(row.assignment, today, None))
            .collect();
        Ok::<_, AppError>(leaderboard(&staff, &views))
    }
    .await;

    match result {
        Ok(entries) => success(entries, revision_id),
        Err(e) => error(e, revision_id),
    }
}

async fn dashboard(state: &AppState, session: &Session) -> Result<DashboardSummary, AppError> {
    let swept = sweep_overdue(&state.repo, &state.calendar, &state.hub).await?;

    let Some(filter) = scope_filter(session, AssignmentFilter::default()) else {
        return Ok(DashboardSummary {
            counts: Default::default(),
            high_priority_open: 0,
            due_today: Vec::new(),
            newly_overdue: swept.flagged,
        });
    };

    let today = state.calendar.today();
    let mut high_priority_open = 0;
    let mut views = Vec::new();
    for row in state.repo.list_assignments(&filter).await? {
        let high_priority = row.task_high_priority;
        let view = state
            .calendar
            .view(row.assignment, today, Some(row.task_title));
        if high_priority && view.display_status != DisplayStatus::Completed {
            high_priority_open += 1;
        }
        views.push(view);
    }

    let counts = tally(&views);
    let due_today = views
        .into_iter()
        .filter(|v| {
            v.display_status != DisplayStatus::Completed
                && state.calendar.local_date(v.assignment.due_date) == today
        })
        .collect();

    Ok(DashboardSummary {
        counts,
        high_priority_open,
        due_today,
        newly_overdue: swept.flagged,
    })
}
