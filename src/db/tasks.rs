//! Task template persistence.

use chrono::Utc;
use sqlx::Row;

use super::Repository;
use crate::errors::AppError;
use crate::models::{
    validate_task_fields, CreateTaskRequest, RecurringPattern, Task, UpdateTaskRequest,
};

const TASK_COLUMNS: &str = "id, title, description, estimated_minutes, is_recurring, recurring_pattern, is_high_priority, created_by, created_at, updated_at, version";

impl Repository {
    /// List all tasks, high priority first.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tasks ORDER BY is_high_priority DESC, title",
            TASK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(task_from_row).collect())
    }

    /// Get a task by ID.
    pub async fn get_task(&self, id: &str) -> Result<Option<Task>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(task_from_row))
    }

    /// Create a new task.
    pub async fn create_task(
        &self,
        request: &CreateTaskRequest,
        created_by: Option<&str>,
    ) -> Result<Task, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let recurring_pattern = request.recurring_pattern.filter(|_| request.is_recurring);

        sqlx::query(
            "INSERT INTO tasks (id, title, description, estimated_minutes, is_recurring, recurring_pattern, is_high_priority, created_by, created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&id)
        .bind(request.title.trim())
        .bind(&request.description)
        .bind(request.estimated_minutes)
        .bind(request.is_recurring as i32)
        .bind(recurring_pattern.map(|p| p.as_str()))
        .bind(request.is_high_priority as i32)
        .bind(created_by)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Task {
            id,
            title: request.title.trim().to_string(),
            description: request.description.clone(),
            estimated_minutes: request.estimated_minutes,
            is_recurring: request.is_recurring,
            recurring_pattern,
            is_high_priority: request.is_high_priority,
            created_by: created_by.map(str::to_string),
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        })
    }

    /// Merge `request` into the stored task without writing it.
    fn merge_task(existing: &Task, request: &UpdateTaskRequest) -> Task {
        let is_recurring = request.is_recurring.unwrap_or(existing.is_recurring);
        let recurring_pattern = if is_recurring {
            request.recurring_pattern.or(existing.recurring_pattern)
        } else {
            None
        };

        Task {
            id: existing.id.clone(),
            title: request
                .title
                .as_ref()
                .map(|t| t.trim().to_string())
                .unwrap_or_else(|| existing.title.clone()),
            description: request.description.clone().or(existing.description.clone()),
            estimated_minutes: request.estimated_minutes.unwrap_or(existing.estimated_minutes),
            is_recurring,
            recurring_pattern,
            is_high_priority: request.is_high_priority.unwrap_or(existing.is_high_priority),
            created_by: existing.created_by.clone(),
            created_at: existing.created_at.clone(),
            updated_at: existing.updated_at.clone(),
            version: existing.version,
        }
    }

    /// Update a task with optimistic concurrency control.
    pub async fn update_task(
        &self,
        id: &str,
        request: &UpdateTaskRequest,
    ) -> Result<Task, AppError> {
        let existing = self
            .get_task(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Task {} not found", id)))?;

        // Check version for optimistic concurrency
        if let Some(expected) = request.expected_version {
            if existing.version != expected {
                return Err(AppError::version_mismatch(expected, existing.version));
            }
        }

        let mut task = Self::merge_task(&existing, request);
        validate_task_fields(
            &task.title,
            task.estimated_minutes,
            task.is_recurring,
            task.recurring_pattern,
        )
        .map_err(AppError::Validation)?;
        task.updated_at = Utc::now().to_rfc3339();
        task.version = existing.version + 1;

        // Use conditional UPDATE with version check to prevent race conditions
        let result = sqlx::query(
            "UPDATE tasks SET title = ?, description = ?, estimated_minutes = ?, is_recurring = ?, recurring_pattern = ?, is_high_priority = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.estimated_minutes)
        .bind(task.is_recurring as i32)
        .bind(task.recurring_pattern.map(|p| p.as_str()))
        .bind(task.is_high_priority as i32)
        .bind(&task.updated_at)
        .bind(task.version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_task(id).await?;
            return Err(AppError::concurrent_modification(current.map(|t| t.version)));
        }

        self.increment_revision().await?;
        Ok(task)
    }

    /// Delete a task together with its assignments.
    pub async fn delete_task(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Task {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }
}

fn task_from_row(row: &sqlx::sqlite::SqliteRow) -> Task {
    let is_recurring: i32 = row.get("is_recurring");
    let is_high_priority: i32 = row.get("is_high_priority");
    let recurring_pattern: Option<String> = row.get("recurring_pattern");
    Task {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        estimated_minutes: row.get("estimated_minutes"),
        is_recurring: is_recurring != 0,
        recurring_pattern: recurring_pattern.and_then(|p| RecurringPattern::parse(&p)),
        is_high_priority: is_high_priority != 0,
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}
