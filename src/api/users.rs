//! User API endpoints.

use axum::{extract::State, Extension};

use super::{error, revision, success, ApiResult};
use crate::auth::Session;
use crate::models::User;
use crate::AppState;

/// GET /api/users - List all user accounts (admin).
pub async fn list_users(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Vec<User>> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    match state.repo.list_users().await {
        Ok(users) => success(users, revision_id),
        Err(e) => error(e, revision_id),
    }
}
