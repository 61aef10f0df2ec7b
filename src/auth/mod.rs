//! Bearer-token authentication and the request-scoped session.
//!
//! The middleware resolves the token to a [`Session`] and stores it in the
//! request extensions; handlers take it as `Extension<Session>`.

mod password;
mod token;

pub use password::{hash_password, validate_new_password, verify_password};
pub use token::{hours_after, issue_token, verify_token};

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::{Role, TaskAssignment, User};
use crate::AppState;

/// The authenticated caller of one request.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    /// Outlet of an outlet account
    pub outlet_id: Option<String>,
    /// Staff profile of a staff account, if one was created
    pub staff_id: Option<String>,
}

impl Session {
    pub fn new(user: &User, staff_id: Option<String>) -> Self {
        Self {
            user_id: user.id.clone(),
            role: user.role,
            outlet_id: user.outlet_id.clone(),
            staff_id,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Administrator access required".to_string()))
        }
    }

    /// Whether the assignment is addressed to this caller.
    pub fn owns(&self, assignment: &TaskAssignment) -> bool {
        let matches = |mine: &Option<String>, theirs: &Option<String>| {
            mine.is_some() && mine.as_deref() == theirs.as_deref()
        };
        match self.role {
            Role::Admin => false,
            Role::Staff => matches(&self.staff_id, &assignment.staff_id),
            Role::Outlet => matches(&self.outlet_id, &assignment.outlet_id),
        }
    }

    pub fn can_view(&self, assignment: &TaskAssignment) -> bool {
        self.is_admin() || self.owns(assignment)
    }
}

/// Middleware: require a valid bearer token for an active user.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = verify_token(token, state.config.jwt_secret.as_bytes())?;

    let user = match state.repo.get_user(&claims.sub).await? {
        Some(user) if user.is_active => user,
        Some(_) => {
            tracing::warn!(user_id = %claims.sub, "auth: inactive user presented a token");
            return Err(AppError::Unauthorized("Account is disabled".to_string()));
        }
        None => {
            tracing::warn!(user_id = %claims.sub, "auth: token for unknown user");
            return Err(AppError::Unauthorized("Invalid or expired session".to_string()));
        }
    };

    let staff_id = match user.role {
        Role::Staff => state.repo.staff_id_for_user(&user.id).await?,
        _ => None,
    };

    request.extensions_mut().insert(Session::new(&user, staff_id));
    Ok(next.run(request).await)
}

/// Constant-time string comparison, used for invitation tokens.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session(role: Role, staff_id: Option<&str>, outlet_id: Option<&str>) -> Session {
        Session {
            user_id: "u-1".to_string(),
            role,
            outlet_id: outlet_id.map(str::to_string),
            staff_id: staff_id.map(str::to_string),
        }
    }

    fn assignment(staff_id: Option<&str>, outlet_id: Option<&str>) -> TaskAssignment {
        let now = Utc::now();
        TaskAssignment {
            id: "a-1".to_string(),
            task_id: "t-1".to_string(),
            staff_id: staff_id.map(str::to_string),
            outlet_id: outlet_id.map(str::to_string),
            assigned_date: now,
            due_date: now,
            status: crate::models::AssignmentStatus::Pending,
            completed_at: None,
            completion_proof: None,
            completion_notes: None,
            minutes_deducted: None,
            requested_due_date: None,
            reschedule_reason: None,
            created_at: now.to_rfc3339(),
            updated_at: now.to_rfc3339(),
            version: 1,
        }
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("test-key-123", "test-key-123"));
        assert!(!constant_time_compare("test-key-123", "test-key-124"));
        assert!(!constant_time_compare("short", "much-longer-key"));
        assert!(constant_time_compare("", ""));
    }

    #[test]
    fn test_require_admin() {
        assert!(session(Role::Admin, None, None).require_admin().is_ok());
        let err = session(Role::Staff, Some("s-1"), None).require_admin().unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_staff_owns_only_their_assignments() {
        let staff = session(Role::Staff, Some("s-1"), None);
        assert!(staff.owns(&assignment(Some("s-1"), None)));
        assert!(!staff.owns(&assignment(Some("s-2"), None)));
        assert!(!staff.owns(&assignment(None, Some("o-1"))));
    }

    #[test]
    fn test_staff_without_profile_owns_nothing() {
        let staff = session(Role::Staff, None, None);
        assert!(!staff.owns(&assignment(None, Some("o-1"))));
    }

    #[test]
    fn test_outlet_owns_outlet_assignments() {
        let outlet = session(Role::Outlet, None, Some("o-1"));
        assert!(outlet.owns(&assignment(Some("s-1"), Some("o-1"))));
        assert!(!outlet.owns(&assignment(Some("s-1"), Some("o-2"))));
    }

    #[test]
    fn test_admin_can_view_everything() {
        let admin = session(Role::Admin, None, None);
        assert!(admin.can_view(&assignment(Some("s-9"), None)));
        assert!(!admin.owns(&assignment(Some("s-9"), None)));
    }
}
