//! Outlet persistence.

use chrono::Utc;
use sqlx::Row;

use super::Repository;
use crate::errors::AppError;
use crate::models::{CreateOutletRequest, Outlet, UpdateOutletRequest};

impl Repository {
    /// List all outlets.
    pub async fn list_outlets(&self) -> Result<Vec<Outlet>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, address, phone, email, manager_name, is_active, created_at, updated_at, version FROM outlets ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(outlet_from_row).collect())
    }

    /// Get an outlet by ID.
    pub async fn get_outlet(&self, id: &str) -> Result<Option<Outlet>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, address, phone, email, manager_name, is_active, created_at, updated_at, version FROM outlets WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(outlet_from_row))
    }

    /// Create a new outlet.
    pub async fn create_outlet(&self, request: &CreateOutletRequest) -> Result<Outlet, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO outlets (id, name, address, phone, email, manager_name, is_active, created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&id)
        .bind(request.name.trim())
        .bind(&request.address)
        .bind(&request.phone)
        .bind(&request.email)
        .bind(&request.manager_name)
        .bind(request.is_active as i32)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Outlet {
            id,
            name: request.name.trim().to_string(),
            address: request.address.clone(),
            phone: request.phone.clone(),
            email: request.email.clone(),
            manager_name: request.manager_name.clone(),
            is_active: request.is_active,
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        })
    }

    /// Update an outlet with optimistic concurrency control.
    pub async fn update_outlet(
        &self,
        id: &str,
        request: &UpdateOutletRequest,
    ) -> Result<Outlet, AppError> {
        let existing = self
            .get_outlet(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Outlet {} not found", id)))?;

        if let Some(expected) = request.expected_version {
            if existing.version != expected {
                return Err(AppError::version_mismatch(expected, existing.version));
            }
        }

        let name = request
            .name
            .as_ref()
            .map(|n| n.trim().to_string())
            .unwrap_or_else(|| existing.name.clone());
        if name.is_empty() {
            return Err(AppError::Validation("Outlet name is required".to_string()));
        }

        let now = Utc::now().to_rfc3339();
        let new_version = existing.version + 1;
        let address = request.address.clone().or(existing.address.clone());
        let phone = request.phone.clone().or(existing.phone.clone());
        let email = request.email.clone().or(existing.email.clone());
        let manager_name = request.manager_name.clone().or(existing.manager_name.clone());
        let is_active = request.is_active.unwrap_or(existing.is_active);

        let result = sqlx::query(
            "UPDATE outlets SET name = ?, address = ?, phone = ?, email = ?, manager_name = ?, is_active = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?",
        )
        .bind(&name)
        .bind(&address)
        .bind(&phone)
        .bind(&email)
        .bind(&manager_name)
        .bind(is_active as i32)
        .bind(&now)
        .bind(new_version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_outlet(id).await?;
            return Err(AppError::concurrent_modification(current.map(|o| o.version)));
        }

        self.increment_revision().await?;

        Ok(Outlet {
            id: id.to_string(),
            name,
            address,
            phone,
            email,
            manager_name,
            is_active,
            created_at: existing.created_at,
            updated_at: now,
            version: new_version,
        })
    }

    /// Delete an outlet. Its assignments go with it.
    pub async fn delete_outlet(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM outlets WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Outlet {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }
}

fn outlet_from_row(row: &sqlx::sqlite::SqliteRow) -> Outlet {
    let is_active: i32 = row.get("is_active");
    Outlet {
        id: row.get("id"),
        name: row.get("name"),
        address: row.get("address"),
        phone: row.get("phone"),
        email: row.get("email"),
        manager_name: row.get("manager_name"),
        is_active: is_active != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}
