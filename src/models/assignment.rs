//! Task assignments: one task handed to a staff member or outlet with a due date.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DateInput;
use crate::status::DisplayStatus;

/// Stored lifecycle status of an assignment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Completed,
    Overdue,
    RescheduleRequested,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Overdue => "overdue",
            AssignmentStatus::RescheduleRequested => "reschedule_requested",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AssignmentStatus::Pending),
            "completed" => Some(AssignmentStatus::Completed),
            "overdue" => Some(AssignmentStatus::Overdue),
            "reschedule_requested" => Some(AssignmentStatus::RescheduleRequested),
            _ => None,
        }
    }
}

/// An assignment as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignment {
    pub id: String,
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlet_id: Option<String>,
    pub assigned_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub status: AssignmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_proof: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes_deducted: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reschedule_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

/// An assignment as returned by the API: stored fields plus the derived status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentView {
    #[serde(flatten)]
    pub assignment: TaskAssignment,
    pub display_status: DisplayStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_title: Option<String>,
}

/// Request body for creating an assignment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentRequest {
    pub task_id: String,
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub outlet_id: Option<String>,
    /// Defaults to now
    #[serde(default)]
    pub assigned_date: Option<DateInput>,
    pub due_date: DateInput,
}

/// Admin edits of an assignment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssignmentRequest {
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub outlet_id: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateInput>,
    #[serde(default)]
    pub status: Option<AssignmentStatus>,
    #[serde(default)]
    pub minutes_deducted: Option<i64>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Resolved changes applied to an assignment row.
#[derive(Debug, Clone, Default)]
pub struct AssignmentChanges {
    pub staff_id: Option<String>,
    pub outlet_id: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<AssignmentStatus>,
    pub minutes_deducted: Option<i64>,
    pub expected_version: Option<i64>,
}

/// Staff submission of completion proof.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteAssignmentRequest {
    /// Location of the uploaded photo or video
    pub proof_url: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Staff request to move the due date.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    pub requested_due_date: DateInput,
    pub reason: String,
}

/// Filters for listing assignments.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentFilter {
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub outlet_id: Option<String>,
    #[serde(default)]
    pub status: Option<AssignmentStatus>,
    #[serde(default)]
    pub task_id: Option<String>,
}

/// Result of an overdue sweep.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
    pub flagged: usize,
    pub assignment_ids: Vec<String>,
}
