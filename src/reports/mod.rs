//! Aggregations behind the dashboard and the staff leaderboard.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{AssignmentStatus, AssignmentView, LeaderboardEntry, StaffMember, StatusCounts};
use crate::status::DisplayStatus;

/// Count assignments by their derived status.
pub fn tally(views: &[AssignmentView]) -> StatusCounts {
    let mut counts = StatusCounts {
        total: views.len(),
        ..StatusCounts::default()
    };
    for view in views {
        match view.display_status {
            DisplayStatus::Pending => counts.pending += 1,
            DisplayStatus::Overdue => counts.overdue += 1,
            DisplayStatus::Completed => counts.completed += 1,
        }
        if view.assignment.status == AssignmentStatus::RescheduleRequested {
            counts.reschedule_requested += 1;
        }
    }
    counts
}

/// Per-staff completion statistics, best performers first.
///
/// Staff without assignments are listed with zeros. Ties on completion rate
/// are broken by completed count, then by name.
pub fn leaderboard(staff: &[StaffMember], views: &[AssignmentView]) -> Vec<LeaderboardEntry> {
    let mut by_staff: HashMap<&str, LeaderboardEntry> = staff
        .iter()
        .map(|member| {
            (
                member.profile.id.as_str(),
                LeaderboardEntry {
                    staff_id: member.profile.id.clone(),
                    name: member.name.clone(),
                    assigned: 0,
                    completed: 0,
                    overdue: 0,
                    pending: 0,
                    completion_rate: 0.0,
                    minutes_deducted: 0,
                },
            )
        })
        .collect();

    for view in views {
        let Some(staff_id) = view.assignment.staff_id.as_deref() else {
            continue;
        };
        let Some(entry) = by_staff.get_mut(staff_id) else {
            continue;
        };
        entry.assigned += 1;
        match view.display_status {
            DisplayStatus::Pending => entry.pending += 1,
            DisplayStatus::Overdue => entry.overdue += 1,
            DisplayStatus::Completed => entry.completed += 1,
        }
        entry.minutes_deducted += view.assignment.minutes_deducted.unwrap_or(0);
    }

    let mut entries: Vec<LeaderboardEntry> = by_staff
        .into_values()
        .map(|mut entry| {
            if entry.assigned > 0 {
                entry.completion_rate = entry.completed as f64 / entry.assigned as f64;
            }
            entry
        })
        .collect();

    entries.sort_by(|a, b| {
        b.completion_rate
            .partial_cmp(&a.completion_rate)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.completed.cmp(&a.completed))
            .then_with(|| a.name.cmp(&b.name))
    });
    entries
}
