//! Staff profile persistence.

use chrono::{NaiveDate, Utc};
use sqlx::Row;

use super::Repository;
use crate::errors::AppError;
use crate::models::{CreateStaffRequest, StaffMember, StaffProfile, UpdateStaffRequest};

const STAFF_SELECT: &str = r#"SELECT s.id, s.user_id, s.position_id, s.employee_id, s.hire_date,
           s.is_active, s.created_at, s.updated_at, s.version,
           u.name AS user_name, u.email AS user_email, p.name AS position_name
    FROM staff_profiles s
    JOIN users u ON u.id = s.user_id
    LEFT JOIN positions p ON p.id = s.position_id"#;

impl Repository {
    /// List all staff members with their user and position.
    pub async fn list_staff(&self) -> Result<Vec<StaffMember>, AppError> {
        let rows = sqlx::query(&format!("{} ORDER BY u.name", STAFF_SELECT))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(staff_member_from_row).collect())
    }

    /// Get a staff member by profile ID.
    pub async fn get_staff(&self, id: &str) -> Result<Option<StaffMember>, AppError> {
        let row = sqlx::query(&format!("{} WHERE s.id = ?", STAFF_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(staff_member_from_row))
    }

    /// Get the staff profile ID belonging to a user, if any.
    pub async fn staff_id_for_user(&self, user_id: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT id FROM staff_profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("id")))
    }

    /// Create a staff profile for an existing user.
    pub async fn create_staff(&self, request: &CreateStaffRequest) -> Result<StaffMember, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO staff_profiles (id, user_id, position_id, employee_id, hire_date, is_active, created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&id)
        .bind(&request.user_id)
        .bind(&request.position_id)
        .bind(request.employee_id.trim())
        .bind(request.hire_date)
        .bind(request.is_active as i32)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        self.get_staff(&id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Staff {} vanished after insert", id)))
    }

    /// Update a staff profile with optimistic concurrency control.
    pub async fn update_staff(
        &self,
        id: &str,
        request: &UpdateStaffRequest,
    ) -> Result<StaffMember, AppError> {
        let existing = self
            .get_staff(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Staff {} not found", id)))?
            .profile;

        if let Some(expected) = request.expected_version {
            if existing.version != expected {
                return Err(AppError::version_mismatch(expected, existing.version));
            }
        }

        let employee_id = request
            .employee_id
            .as_ref()
            .map(|e| e.trim().to_string())
            .unwrap_or_else(|| existing.employee_id.clone());
        if employee_id.is_empty() {
            return Err(AppError::Validation("Employee ID is required".to_string()));
        }
        let position_id = request.position_id.clone().or(existing.position_id.clone());
        let hire_date = request.hire_date.unwrap_or(existing.hire_date);
        let is_active = request.is_active.unwrap_or(existing.is_active);
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "UPDATE staff_profiles SET position_id = ?, employee_id = ?, hire_date = ?, is_active = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?",
        )
        .bind(&position_id)
        .bind(&employee_id)
        .bind(hire_date)
        .bind(is_active as i32)
        .bind(&now)
        .bind(existing.version + 1)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_staff(id).await?;
            return Err(AppError::concurrent_modification(
                current.map(|s| s.profile.version),
            ));
        }

        self.increment_revision().await?;

        self.get_staff(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Staff {} not found", id)))
    }

    /// Delete a staff profile, its assignments and its schedules.
    pub async fn delete_staff(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM staff_profiles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Staff {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }
}

fn staff_member_from_row(row: &sqlx::sqlite::SqliteRow) -> StaffMember {
    let is_active: i32 = row.get("is_active");
    let hire_date: NaiveDate = row.get("hire_date");
    StaffMember {
        profile: StaffProfile {
            id: row.get("id"),
            user_id: row.get("user_id"),
            position_id: row.get("position_id"),
            employee_id: row.get("employee_id"),
            hire_date,
            is_active: is_active != 0,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            version: row.get("version"),
        },
        name: row.get("user_name"),
        email: row.get("user_email"),
        position_name: row.get("position_name"),
    }
}
