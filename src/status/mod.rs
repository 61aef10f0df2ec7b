//! Assignment status derivation.
//!
//! The stored status lags reality between sweeps, so every view derives the
//! status it shows from the stored status, the due date and today's date.
//! Dates are compared as calendar days in the business timezone; time of day
//! never matters.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::models::{AssignmentStatus, AssignmentView, TaskAssignment};

/// Status shown to users.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Pending,
    Overdue,
    Completed,
}

/// True iff `due` is an earlier calendar day than `today`.
pub fn is_past_due(due: NaiveDate, today: NaiveDate) -> bool {
    due < today
}

/// Derive the displayed status of an assignment.
pub fn display_status(stored: AssignmentStatus, due: NaiveDate, today: NaiveDate) -> DisplayStatus {
    match stored {
        AssignmentStatus::Completed => DisplayStatus::Completed,
        AssignmentStatus::Overdue => DisplayStatus::Overdue,
        AssignmentStatus::Pending if is_past_due(due, today) => DisplayStatus::Overdue,
        AssignmentStatus::Pending | AssignmentStatus::RescheduleRequested => DisplayStatus::Pending,
    }
}

/// Whether the sweep should flip this stored status to overdue.
pub fn needs_overdue_flag(stored: AssignmentStatus, due: NaiveDate, today: NaiveDate) -> bool {
    stored == AssignmentStatus::Pending && is_past_due(due, today)
}

/// Maps instants to calendar days in the business timezone.
#[derive(Debug, Clone, Copy)]
pub struct BusinessCalendar {
    tz: Tz,
}

impl BusinessCalendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// Build the API view of an assignment as of `today`.
    pub fn view(
        &self,
        assignment: TaskAssignment,
        today: NaiveDate,
        task_title: Option<String>,
    ) -> AssignmentView {
        let due = self.local_date(assignment.due_date);
        AssignmentView {
            display_status: display_status(assignment.status, due, today),
            assignment,
            task_title,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_pending_past_due_is_overdue() {
        let today = date("2024-05-10");
        assert_eq!(
            display_status(AssignmentStatus::Pending, date("2024-05-09"), today),
            DisplayStatus::Overdue
        );
    }

    #[test]
    fn test_due_today_is_still_pending() {
        let today = date("2024-05-10");
        assert_eq!(
            display_status(AssignmentStatus::Pending, today, today),
            DisplayStatus::Pending
        );
        assert_eq!(
            display_status(AssignmentStatus::Pending, date("2024-05-11"), today),
            DisplayStatus::Pending
        );
    }

    #[test]
    fn test_completed_wins_regardless_of_due_date() {
        let today = date("2024-05-10");
        for due in [date("2020-01-01"), today, date("2030-01-01")] {
            assert_eq!(
                display_status(AssignmentStatus::Completed, due, today),
                DisplayStatus::Completed
            );
        }
    }

    #[test]
    fn test_stored_overdue_stays_overdue() {
        let today = date("2024-05-10");
        assert_eq!(
            display_status(AssignmentStatus::Overdue, date("2024-06-01"), today),
            DisplayStatus::Overdue
        );
    }

    #[test]
    fn test_reschedule_requested_displays_pending() {
        let today = date("2024-05-10");
        assert_eq!(
            display_status(AssignmentStatus::RescheduleRequested, date("2024-05-01"), today),
            DisplayStatus::Pending
        );
    }

    #[test]
    fn test_needs_overdue_flag_only_for_pending() {
        let today = date("2024-05-10");
        let yesterday = date("2024-05-09");
        assert!(needs_overdue_flag(AssignmentStatus::Pending, yesterday, today));
        assert!(!needs_overdue_flag(AssignmentStatus::Overdue, yesterday, today));
        assert!(!needs_overdue_flag(AssignmentStatus::Completed, yesterday, today));
        assert!(!needs_overdue_flag(AssignmentStatus::Pending, today, today));
    }

    #[test]
    fn test_time_of_day_is_ignored() {
        let calendar = BusinessCalendar::new(Tz::UTC);
        let late_yesterday = Utc.with_ymd_and_hms(2024, 5, 9, 23, 59, 59).unwrap();
        let early_today = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 1).unwrap();
        let today = date("2024-05-10");

        assert!(is_past_due(calendar.local_date(late_yesterday), today));
        assert!(!is_past_due(calendar.local_date(early_today), today));
    }

    #[test]
    fn test_calendar_uses_business_timezone() {
        // 20:00 UTC on the 9th is already the 10th in Kuala Lumpur (UTC+8).
        let calendar = BusinessCalendar::new(chrono_tz::Asia::Kuala_Lumpur);
        let instant = Utc.with_ymd_and_hms(2024, 5, 9, 20, 0, 0).unwrap();
        assert_eq!(calendar.local_date(instant), date("2024-05-10"));
    }
}
