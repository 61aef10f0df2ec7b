//! Task assignment persistence, including the overdue sweep write.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use sqlx::{QueryBuilder, Row, Sqlite};

use super::Repository;
use crate::errors::AppError;
use crate::models::{AssignmentChanges, AssignmentFilter, AssignmentStatus, TaskAssignment};
use crate::status::needs_overdue_flag;

const ASSIGNMENT_SELECT: &str = r#"SELECT a.id, a.task_id, a.staff_id, a.outlet_id, a.assigned_date,
           a.due_date, a.status, a.completed_at, a.completion_proof, a.completion_notes,
           a.minutes_deducted, a.requested_due_date, a.reschedule_reason,
           a.created_at, a.updated_at, a.version,
           t.title AS task_title, t.is_high_priority AS task_high_priority
    FROM task_assignments a
    JOIN tasks t ON t.id = a.task_id"#;

/// An assignment with the task fields views need.
#[derive(Debug, Clone)]
pub struct AssignmentWithTask {
    pub assignment: TaskAssignment,
    pub task_title: String,
    pub task_high_priority: bool,
}

/// Input for inserting an assignment.
#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub task_id: String,
    pub staff_id: Option<String>,
    pub outlet_id: Option<String>,
    pub assigned_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

impl Repository {
    /// List assignments matching `filter`, soonest due first.
    pub async fn list_assignments(
        &self,
        filter: &AssignmentFilter,
    ) -> Result<Vec<AssignmentWithTask>, AppError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(ASSIGNMENT_SELECT);
        builder.push(" WHERE 1 = 1");
        if let Some(staff_id) = &filter.staff_id {
            builder.push(" AND a.staff_id = ").push_bind(staff_id.clone());
        }
        if let Some(outlet_id) = &filter.outlet_id {
            builder.push(" AND a.outlet_id = ").push_bind(outlet_id.clone());
        }
        if let Some(status) = filter.status {
            builder.push(" AND a.status = ").push_bind(status.as_str());
        }
        if let Some(task_id) = &filter.task_id {
            builder.push(" AND a.task_id = ").push_bind(task_id.clone());
        }
        builder.push(" ORDER BY a.due_date, a.created_at");

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(assignment_with_task_from_row).collect())
    }

    /// Get an assignment by ID.
    pub async fn get_assignment(&self, id: &str) -> Result<Option<AssignmentWithTask>, AppError> {
        let row = sqlx::query(&format!("{} WHERE a.id = ?", ASSIGNMENT_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(assignment_with_task_from_row))
    }

    /// Create a pending assignment.
    pub async fn create_assignment(
        &self,
        new_assignment: &NewAssignment,
    ) -> Result<TaskAssignment, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"INSERT INTO task_assignments (
                id, task_id, staff_id, outlet_id, assigned_date, due_date, status,
                created_at, updated_at, version
            ) VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?, 1)"#,
        )
        .bind(&id)
        .bind(&new_assignment.task_id)
        .bind(&new_assignment.staff_id)
        .bind(&new_assignment.outlet_id)
        .bind(new_assignment.assigned_date)
        .bind(new_assignment.due_date)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(TaskAssignment {
            id,
            task_id: new_assignment.task_id.clone(),
            staff_id: new_assignment.staff_id.clone(),
            outlet_id: new_assignment.outlet_id.clone(),
            assigned_date: new_assignment.assigned_date,
            due_date: new_assignment.due_date,
            status: AssignmentStatus::Pending,
            completed_at: None,
            completion_proof: None,
            completion_notes: None,
            minutes_deducted: None,
            requested_due_date: None,
            reschedule_reason: None,
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        })
    }

    /// Apply admin edits with optimistic concurrency control.
    pub async fn update_assignment(
        &self,
        id: &str,
        changes: &AssignmentChanges,
    ) -> Result<TaskAssignment, AppError> {
        let existing = self.require_assignment(id).await?;

        if let Some(expected) = changes.expected_version {
            if existing.version != expected {
                return Err(AppError::version_mismatch(expected, existing.version));
            }
        }

        let mut updated = existing.clone();
        if let Some(staff_id) = &changes.staff_id {
            updated.staff_id = Some(staff_id.clone());
        }
        if let Some(outlet_id) = &changes.outlet_id {
            updated.outlet_id = Some(outlet_id.clone());
        }
        if let Some(due_date) = changes.due_date {
            updated.due_date = due_date;
        }
        if let Some(minutes) = changes.minutes_deducted {
            updated.minutes_deducted = Some(minutes);
        }
        if let Some(status) = changes.status {
            updated.status = status;
            if status == AssignmentStatus::Completed {
                updated.completed_at = updated.completed_at.or(Some(Utc::now()));
            } else {
                updated.completed_at = None;
            }
            if status != AssignmentStatus::RescheduleRequested {
                updated.requested_due_date = None;
                updated.reschedule_reason = None;
            }
        }

        self.write_assignment(&existing, updated).await
    }

    /// Record completion proof and mark the assignment completed.
    pub async fn complete_assignment(
        &self,
        id: &str,
        proof_url: &str,
        notes: Option<&str>,
    ) -> Result<TaskAssignment, AppError> {
        let existing = self.require_assignment(id).await?;
        if existing.status == AssignmentStatus::Completed {
            return Err(AppError::Conflict(format!(
                "Assignment {} is already completed",
                id
            )));
        }

        let mut updated = existing.clone();
        updated.status = AssignmentStatus::Completed;
        updated.completed_at = Some(Utc::now());
        updated.completion_proof = Some(proof_url.to_string());
        updated.completion_notes = notes.map(str::to_string);
        updated.requested_due_date = None;
        updated.reschedule_reason = None;

        self.write_assignment(&existing, updated).await
    }

    /// Record a staff request to move the due date.
    pub async fn request_reschedule(
        &self,
        id: &str,
        requested_due_date: DateTime<Utc>,
        reason: &str,
    ) -> Result<TaskAssignment, AppError> {
        let existing = self.require_assignment(id).await?;
        match existing.status {
            AssignmentStatus::Pending | AssignmentStatus::Overdue => {}
            AssignmentStatus::Completed => {
                return Err(AppError::Conflict(
                    "Completed assignments cannot be rescheduled".to_string(),
                ))
            }
            AssignmentStatus::RescheduleRequested => {
                return Err(AppError::Conflict(
                    "A reschedule request is already pending".to_string(),
                ))
            }
        }

        let mut updated = existing.clone();
        updated.status = AssignmentStatus::RescheduleRequested;
        updated.requested_due_date = Some(requested_due_date);
        updated.reschedule_reason = Some(reason.to_string());

        self.write_assignment(&existing, updated).await
    }

    /// Approve or reject a pending reschedule request.
    ///
    /// Either way the assignment returns to `pending`; approval also moves the
    /// due date. A rejected request on a past due date is re-flagged by the
    /// next sweep.
    pub async fn resolve_reschedule(
        &self,
        id: &str,
        approve: bool,
    ) -> Result<TaskAssignment, AppError> {
        let existing = self.require_assignment(id).await?;
        if existing.status != AssignmentStatus::RescheduleRequested {
            return Err(AppError::Conflict(format!(
                "Assignment {} has no pending reschedule request",
                id
            )));
        }

        let mut updated = existing.clone();
        if approve {
            if let Some(requested) = existing.requested_due_date {
                updated.due_date = requested;
            }
        }
        updated.status = AssignmentStatus::Pending;
        updated.requested_due_date = None;
        updated.reschedule_reason = None;

        self.write_assignment(&existing, updated).await
    }

    /// Delete an assignment.
    pub async fn delete_assignment(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM task_assignments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Assignment {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }

    /// Flag every pending assignment that is past due as overdue.
    ///
    /// Runs in one transaction. Each write is guarded on the row still being
    /// pending, so concurrent sweeps and a second run on the same data write
    /// nothing. Returns the assignments that were flagged.
    pub async fn flag_overdue(
        &self,
        today: NaiveDate,
        tz: Tz,
    ) -> Result<Vec<TaskAssignment>, AppError> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(&format!("{} WHERE a.status = 'pending'", ASSIGNMENT_SELECT))
            .fetch_all(&mut *tx)
            .await?;

        let candidates: Vec<TaskAssignment> = rows
            .iter()
            .map(|row| assignment_with_task_from_row(row).assignment)
            .filter(|a| {
                let due = a.due_date.with_timezone(&tz).date_naive();
                needs_overdue_flag(a.status, due, today)
            })
            .collect();

        let now = Utc::now().to_rfc3339();
        let mut flagged = Vec::new();
        for mut assignment in candidates {
            let result = sqlx::query(
                "UPDATE task_assignments SET status = 'overdue', updated_at = ?, version = version + 1 WHERE id = ? AND status = 'pending'",
            )
            .bind(&now)
            .bind(&assignment.id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 1 {
                assignment.status = AssignmentStatus::Overdue;
                assignment.updated_at = now.clone();
                assignment.version += 1;
                flagged.push(assignment);
            }
        }

        if !flagged.is_empty() {
            sqlx::query(
                "UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1",
            )
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(flagged)
    }

    async fn require_assignment(&self, id: &str) -> Result<TaskAssignment, AppError> {
        self.get_assignment(id)
            .await?
            .map(|row| row.assignment)
            .ok_or_else(|| AppError::NotFound(format!("Assignment {} not found", id)))
    }

    /// Write every mutable column of `updated`, conditional on `existing.version`.
    async fn write_assignment(
        &self,
        existing: &TaskAssignment,
        mut updated: TaskAssignment,
    ) -> Result<TaskAssignment, AppError> {
        updated.updated_at = Utc::now().to_rfc3339();
        updated.version = existing.version + 1;

        let result = sqlx::query(
            r#"UPDATE task_assignments SET
                staff_id = ?, outlet_id = ?, due_date = ?, status = ?, completed_at = ?,
                completion_proof = ?, completion_notes = ?, minutes_deducted = ?,
                requested_due_date = ?, reschedule_reason = ?, updated_at = ?, version = ?
            WHERE id = ? AND version = ?"#,
        )
        .bind(&updated.staff_id)
        .bind(&updated.outlet_id)
        .bind(updated.due_date)
        .bind(updated.status.as_str())
        .bind(updated.completed_at)
        .bind(&updated.completion_proof)
        .bind(&updated.completion_notes)
        .bind(updated.minutes_deducted)
        .bind(updated.requested_due_date)
        .bind(&updated.reschedule_reason)
        .bind(&updated.updated_at)
        .bind(updated.version)
        .bind(&existing.id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_assignment(&existing.id).await?;
            return Err(AppError::concurrent_modification(
                current.map(|row| row.assignment.version),
            ));
        }

        self.increment_revision().await?;
        Ok(updated)
    }
}

fn assignment_with_task_from_row(row: &sqlx::sqlite::SqliteRow) -> AssignmentWithTask {
    let status: String = row.get("status");
    let task_high_priority: i32 = row.get("task_high_priority");
    AssignmentWithTask {
        assignment: TaskAssignment {
            id: row.get("id"),
            task_id: row.get("task_id"),
            staff_id: row.get("staff_id"),
            outlet_id: row.get("outlet_id"),
            assigned_date: row.get("assigned_date"),
            due_date: row.get("due_date"),
            // The CHECK constraint keeps unknown statuses out of the table.
            status: AssignmentStatus::parse(&status).unwrap_or(AssignmentStatus::Pending),
            completed_at: row.get("completed_at"),
            completion_proof: row.get("completion_proof"),
            completion_notes: row.get("completion_notes"),
            minutes_deducted: row.get("minutes_deducted"),
            requested_due_date: row.get("requested_due_date"),
            reschedule_reason: row.get("reschedule_reason"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            version: row.get("version"),
        },
        task_title: row.get("task_title"),
        task_high_priority: task_high_priority != 0,
    }
}
