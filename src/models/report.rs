//! Dashboard and report payloads.

use serde::Serialize;

use super::AssignmentView;

/// Counts of assignments by derived status.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub overdue: usize,
    pub completed: usize,
    pub reschedule_requested: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub counts: StatusCounts,
    /// Open assignments whose task is high priority
    pub high_priority_open: usize,
    pub due_today: Vec<AssignmentView>,
    /// Assignments flagged by the sweep that ran for this request
    pub newly_overdue: usize,
}

/// Completion statistics for one staff member.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub staff_id: String,
    pub name: String,
    pub assigned: usize,
    pub completed: usize,
    pub overdue: usize,
    pub pending: usize,
    /// Completed / assigned, 0.0 when nothing is assigned
    pub completion_rate: f64,
    pub minutes_deducted: i64,
}
