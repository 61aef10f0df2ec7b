//! Invitation persistence.

use chrono::{DateTime, Utc};
use sqlx::Row;

use super::{normalize_email, Repository};
use crate::errors::AppError;
use crate::models::{Invitation, NewUser, Role, User};

impl Repository {
    /// List all invitations, newest first.
    pub async fn list_invitations(&self) -> Result<Vec<Invitation>, AppError> {
        let rows = sqlx::query(
            "SELECT id, email, role, outlet_id, token, invited_by, expires_at, used_at, created_at FROM invitations ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(invitation_from_row).collect())
    }

    /// Open invitations for an email address.
    pub async fn open_invitations_for(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invitation>, AppError> {
        let rows = sqlx::query(
            "SELECT id, email, role, outlet_id, token, invited_by, expires_at, used_at, created_at FROM invitations WHERE email = ? AND used_at IS NULL",
        )
        .bind(normalize_email(email))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(invitation_from_row)
            .filter(|inv| inv.is_open(now))
            .collect())
    }

    /// Create an invitation.
    pub async fn create_invitation(
        &self,
        email: &str,
        role: Role,
        outlet_id: Option<&str>,
        invited_by: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<Invitation, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let token = uuid::Uuid::new_v4().simple().to_string();
        let now = Utc::now().to_rfc3339();
        let email = normalize_email(email);

        sqlx::query(
            "INSERT INTO invitations (id, email, role, outlet_id, token, invited_by, expires_at, used_at, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?)",
        )
        .bind(&id)
        .bind(&email)
        .bind(role.as_str())
        .bind(outlet_id)
        .bind(&token)
        .bind(invited_by)
        .bind(expires_at)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Invitation {
            id,
            email,
            role,
            outlet_id: outlet_id.map(str::to_string),
            token,
            invited_by: invited_by.map(str::to_string),
            expires_at,
            used_at: None,
            created_at: now,
        })
    }

    /// Consume an invitation and create its user in one transaction.
    ///
    /// The guarded update makes a second acceptance of the same invitation fail.
    pub async fn accept_invitation(
        &self,
        invitation: &Invitation,
        new_user: &NewUser,
    ) -> Result<User, AppError> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE invitations SET used_at = ? WHERE id = ? AND used_at IS NULL",
        )
        .bind(now)
        .bind(&invitation.id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::Conflict("Invitation was already used".to_string()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let email = normalize_email(&new_user.email);
        sqlx::query(
            "INSERT INTO users (id, email, name, role, outlet_id, is_active, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&email)
        .bind(&new_user.name)
        .bind(new_user.role.as_str())
        .bind(&new_user.outlet_id)
        .bind(&new_user.password_hash)
        .bind(&now_str)
        .bind(&now_str)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now_str)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(User {
            id,
            email,
            name: new_user.name.clone(),
            role: new_user.role,
            outlet_id: new_user.outlet_id.clone(),
            is_active: true,
            password_hash: new_user.password_hash.clone(),
            created_at: now_str.clone(),
            updated_at: now_str,
        })
    }

    /// Delete (revoke) an invitation.
    pub async fn delete_invitation(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM invitations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Invitation {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }
}

fn invitation_from_row(row: &sqlx::sqlite::SqliteRow) -> Invitation {
    let role: String = row.get("role");
    Invitation {
        id: row.get("id"),
        email: row.get("email"),
        role: Role::parse(&role).unwrap_or(Role::Staff),
        outlet_id: row.get("outlet_id"),
        token: row.get("token"),
        invited_by: row.get("invited_by"),
        expires_at: row.get("expires_at"),
        used_at: row.get("used_at"),
        created_at: row.get("created_at"),
    }
}
