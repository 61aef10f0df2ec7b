//! REST API module.
//!
//! Contains all API routes and handlers. Every JSON response uses the
//! `{ success, data | error, revisionId }` envelope.

mod assignments;
mod auth;
mod events;
mod invitations;
mod outlets;
mod positions;
mod reports;
mod schedules;
mod staff;
mod tasks;
mod users;

pub use assignments::*;
pub use auth::*;
pub use events::*;
pub use invitations::*;
pub use outlets::*;
pub use positions::*;
pub use reports::*;
pub use schedules::*;
pub use staff::*;
pub use tasks::*;
pub use users::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, crate::errors::AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: crate::errors::AppError, revision_id: i64) -> ApiResult<T> {
    Err(crate::errors::AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// Current revision, or 0 if it cannot be read.
async fn revision(state: &AppState) -> i64 {
    state.repo.get_revision_id().await.unwrap_or(0)
}

/// Success response carrying the revision after a write.
async fn written<T: Serialize>(state: &AppState, data: T, fallback: i64) -> ApiResult<T> {
    let new_revision = state.repo.get_revision_id().await.unwrap_or(fallback);
    success(data, new_revision)
}
