//! Login and session endpoints.

use axum::{extract::State, Extension, Json};

use super::{error, revision, success, ApiResult};
use crate::auth::{hash_password, issue_token, verify_password, Session};
use crate::errors::AppError;
use crate::models::{menu_for, LoginRequest, LoginResponse, SessionInfo, User, LANDING_ROUTE};
use crate::AppState;

const BAD_CREDENTIALS: &str = "Invalid email or password";

/// POST /api/auth/login - Exchange credentials for a session token.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let revision_id = revision(&state).await;

    match authenticate(&state, &request).await {
        Ok(user) => match session_response(&state, user) {
            Ok(response) => success(response, revision_id),
            Err(e) => error(e, revision_id),
        },
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/auth/me - The current user with their menu.
pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<SessionInfo> {
    let revision_id = revision(&state).await;

    match state.repo.get_user(&session.user_id).await {
        Ok(Some(user)) => success(
            SessionInfo {
                menu: menu_for(user.role),
                user,
                staff_id: session.staff_id,
            },
            revision_id,
        ),
        Ok(None) => error(
            AppError::Unauthorized("Invalid or expired session".to_string()),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

async fn authenticate(state: &AppState, request: &LoginRequest) -> Result<User, AppError> {
    let Some(user) = state
        .repo
        .get_user_by_email(&request.email)
        .await?
        .filter(|u| u.is_active)
    else {
        // Unknown accounts cost one Argon2 run, like known ones.
        let _ = hash_password(&request.password);
        tracing::info!("Login rejected: unknown or inactive account");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
    };

    if !verify_password(&request.password, &user.password_hash)? {
        tracing::info!(email = %user.email, "Login rejected: wrong password");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
    }

    tracing::info!(email = %user.email, role = user.role.as_str(), "User logged in");
    Ok(user)
}

/// Token, landing route and menu for a freshly authenticated user.
pub(super) fn session_response(state: &AppState, user: User) -> Result<LoginResponse, AppError> {
    let token = issue_token(
        &user.id,
        user.role,
        state.config.jwt_secret.as_bytes(),
        state.config.token_ttl_hours,
    )?;

    Ok(LoginResponse {
        token,
        menu: menu_for(user.role),
        user,
        redirect_to: LANDING_ROUTE,
    })
}
