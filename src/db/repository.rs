//! Database repository for CRUD operations.
//!
//! Entity-specific operations live in sibling modules as further `impl Repository`
//! blocks; this file holds the revision counter, users and positions.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{CreatePositionRequest, NewUser, Position, Role, User};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
}

/// Revision counter, bumped by every write.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub revision_id: i64,
    pub generated_at: String,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
        })
    }

    /// Increment the revision ID and return the new value.
    pub async fn increment_revision(&self) -> Result<i64, AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&self.pool)
            .await?;
        self.get_revision_id().await
    }

    // ==================== USER OPERATIONS ====================

    /// List all users.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query(
            "SELECT id, email, name, role, outlet_id, is_active, password_hash, created_at, updated_at FROM users ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT id, email, name, role, outlet_id, is_active, password_hash, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Get a user by email, case-insensitively.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT id, email, name, role, outlet_id, is_active, password_hash, created_at, updated_at FROM users WHERE email = ?",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Whether at least one active admin exists.
    pub async fn has_admin(&self) -> Result<bool, AppError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM users WHERE role = 'admin' AND is_active = 1",
        )
        .fetch_one(&self.pool)
        .await?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    /// Create a new user.
    pub async fn create_user(&self, new_user: &NewUser) -> Result<User, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
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
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(User {
            id,
            email,
            name: new_user.name.clone(),
            role: new_user.role,
            outlet_id: new_user.outlet_id.clone(),
            is_active: true,
            password_hash: new_user.password_hash.clone(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    // ==================== POSITION OPERATIONS ====================

    /// List all positions.
    pub async fn list_positions(&self) -> Result<Vec<Position>, AppError> {
        let rows =
            sqlx::query("SELECT id, name, description, created_at FROM positions ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .iter()
            .map(|row| Position {
                id: row.get("id"),
                name: row.get("name"),
                description: row.get("description"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    /// Create a new position.
    pub async fn create_position(
        &self,
        request: &CreatePositionRequest,
    ) -> Result<Position, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let name = request.name.trim().to_string();

        sqlx::query("INSERT INTO positions (id, name, description, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&name)
            .bind(&request.description)
            .bind(&now)
            .execute(&self.pool)
            .await?;

        self.increment_revision().await?;

        Ok(Position {
            id,
            name,
            description: request.description.clone(),
            created_at: now,
        })
    }

    /// Delete a position. Staff holding it keep their profile without a position.
    pub async fn delete_position(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM positions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Position {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }
}

/// Emails are stored trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> User {
    let is_active: i32 = row.get("is_active");
    let role: String = row.get("role");
    User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        // The CHECK constraint keeps unknown roles out of the table.
        role: Role::parse(&role).unwrap_or(Role::Staff),
        outlet_id: row.get("outlet_id"),
        is_active: is_active != 0,
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
