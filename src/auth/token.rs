//! HS256 session tokens.

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// `now` plus `hours`, or an error when that is not a representable instant.
pub fn hours_after(now: DateTime<Utc>, hours: i64) -> Result<DateTime<Utc>, AppError> {
    TimeDelta::try_hours(hours)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| AppError::Internal(format!("Lifetime of {} hours is out of range", hours)))
}

/// Issue a token for `user_id` valid for `ttl_hours`.
pub fn issue_token(
    user_id: &str,
    role: Role,
    secret: &[u8],
    ttl_hours: i64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        iat: now.timestamp(),
        exp: hours_after(now, ttl_hours)?.timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AppError::Internal(format!("Token encoding failed: {}", e)))
}

/// Verify signature and expiry.
pub fn verify_token(token: &str, secret: &[u8]) -> Result<Claims, AppError> {
    let validation = Validation::new(Algorithm::HS256);
    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "Token rejected");
            AppError::Unauthorized("Invalid or expired session".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn test_issue_and_verify() {
        let token = issue_token("user-1", Role::Staff, SECRET, 1).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, Role::Staff);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token("user-1", Role::Admin, SECRET, 1).unwrap();
        let err = verify_token(&token, b"other-secret").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_expired_token_rejected() {
        // Well past the default 60s leeway.
        let token = issue_token("user-1", Role::Admin, SECRET, -2).unwrap();
        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_oversized_lifetime_is_an_error() {
        let err = issue_token("user-1", Role::Admin, SECRET, i64::MAX).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(hours_after(Utc::now(), -i64::MAX).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(verify_token("not.a.token", SECRET).is_err());
    }
}
