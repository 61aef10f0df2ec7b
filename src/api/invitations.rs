//! Invitation API endpoints.
//!
//! Admins invite an email address with a role; the invitee accepts with the
//! token, choosing a name and password, and is logged in.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;

use super::auth::session_response;
use super::{error, revision, success, written, ApiResult};
use crate::auth::{
    constant_time_compare, hash_password, hours_after, validate_new_password, Session,
};
use crate::errors::AppError;
use crate::models::{
    AcceptInvitationRequest, CreateInvitationRequest, Invitation, LoginResponse, NewUser, Role,
};
use crate::notify::{ChangeEvent, ChangeTable};
use crate::AppState;

/// GET /api/invitations - List invitations (admin).
pub async fn list_invitations(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Vec<Invitation>> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    match state.repo.list_invitations().await {
        Ok(invitations) => success(invitations, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/invitations - Invite a new user (admin).
pub async fn create_invitation(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreateInvitationRequest>,
) -> ApiResult<Invitation> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    match invite(&state, &session, &request).await {
        Ok(invitation) => {
            state.hub.publish(ChangeEvent::insert(
                ChangeTable::Invitations,
                &invitation.id,
                &invitation,
            ));
            tracing::info!(email = %invitation.email, role = invitation.role.as_str(), "Invitation created");
            written(&state, invitation, revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/invitations/:id - Revoke an invitation (admin).
pub async fn delete_invitation(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = revision(&state).await;
    if let Err(e) = session.require_admin() {
        return error(e, revision_id);
    }

    match state.repo.delete_invitation(&id).await {
        Ok(()) => {
            state
                .hub
                .publish(ChangeEvent::delete(ChangeTable::Invitations, &id));
            written(&state, (), revision_id).await
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/auth/accept-invitation - Create the invited account and log in.
pub async fn accept_invitation(
    State(state): State<AppState>,
    Json(request): Json<AcceptInvitationRequest>,
) -> ApiResult<LoginResponse> {
    let revision_id = revision(&state).await;

    let result = async {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        validate_new_password(&request.password)?;

        let invitation = state
            .repo
            .open_invitations_for(&request.email, Utc::now())
            .await?
            .into_iter()
            .find(|inv| constant_time_compare(&inv.token, request.token.trim()))
            .ok_or_else(|| {
                AppError::Unauthorized("Invitation is invalid or has expired".to_string())
            })?;

        let new_user = NewUser {
            email: invitation.email.clone(),
            name: name.to_string(),
            role: invitation.role,
            outlet_id: invitation.outlet_id.clone(),
            password_hash: hash_password(&request.password)?,
        };
        let user = state.repo.accept_invitation(&invitation, &new_user).await?;
        tracing::info!(email = %user.email, role = user.role.as_str(), "Invitation accepted");

        state
            .hub
            .publish(ChangeEvent::insert(ChangeTable::Users, &user.id, &user));
        session_response(&state, user)
    }
    .await;

    match result {
        Ok(response) => written(&state, response, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

async fn invite(
    state: &AppState,
    session: &Session,
    request: &CreateInvitationRequest,
) -> Result<Invitation, AppError> {
    let email = request.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }

    let outlet_id = request
        .outlet_id
        .as_deref()
        .map(str::trim)
        .filter(|o| !o.is_empty());
    if request.role == Role::Outlet {
        let Some(outlet_id) = outlet_id else {
            return Err(AppError::Validation(
                "Outlet accounts need an outletId".to_string(),
            ));
        };
        if state.repo.get_outlet(outlet_id).await?.is_none() {
            return Err(AppError::Validation(format!(
                "Outlet {} does not exist",
                outlet_id
            )));
        }
    }

    if state.repo.get_user_by_email(email).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "An account for {} already exists",
            email
        )));
    }

    let expires_at = hours_after(Utc::now(), state.config.invitation_ttl_hours)?;
    state
        .repo
        .create_invitation(
            email,
            request.role,
            outlet_id.filter(|_| request.role == Role::Outlet),
            Some(&session.user_id),
            expires_at,
        )
        .await
}
