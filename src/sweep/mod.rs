//! Overdue sweep: persists the overdue status of past-due pending assignments.
//!
//! Runs on a fixed interval in the background and on demand from the API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{AssignmentStatus, SweepResult};
use crate::notify::{ChangeEvent, ChangeTable, NotificationHub};
use crate::status::BusinessCalendar;

/// Flag every past-due pending assignment as overdue and announce each one.
pub async fn sweep_overdue(
    repo: &Repository,
    calendar: &BusinessCalendar,
    hub: &NotificationHub,
) -> Result<SweepResult, AppError> {
    let today = calendar.today();
    let flagged = repo.flag_overdue(today, calendar.timezone()).await?;

    let mut assignment_ids = Vec::with_capacity(flagged.len());
    for assignment in flagged {
        let mut before = assignment.clone();
        before.status = AssignmentStatus::Pending;

        // Re-read for the task title the notification text uses.
        let view = match repo.get_assignment(&assignment.id).await? {
            Some(row) => calendar.view(row.assignment, today, Some(row.task_title)),
            None => calendar.view(assignment.clone(), today, None),
        };
        hub.publish(ChangeEvent::update(
            ChangeTable::TaskAssignments,
            &assignment.id,
            &before,
            &view,
        ));
        assignment_ids.push(assignment.id);
    }

    if !assignment_ids.is_empty() {
        tracing::info!("Overdue sweep flagged {} assignment(s)", assignment_ids.len());
    }

    Ok(SweepResult {
        flagged: assignment_ids.len(),
        assignment_ids,
    })
}

/// Periodic background sweep.
pub struct OverdueSweeper {
    repo: Arc<Repository>,
    calendar: BusinessCalendar,
    hub: Arc<NotificationHub>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl OverdueSweeper {
    pub fn new(
        repo: Arc<Repository>,
        calendar: BusinessCalendar,
        hub: Arc<NotificationHub>,
        interval: Duration,
    ) -> Self {
        Self {
            repo,
            calendar,
            hub,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the sweep loop on the current runtime.
    ///
    /// The first sweep runs immediately so assignments that went overdue
    /// while the server was down are flagged at startup.
    pub fn start(&self) -> JoinHandle<()> {
        let repo = Arc::clone(&self.repo);
        let hub = Arc::clone(&self.hub);
        let shutdown = Arc::clone(&self.shutdown);
        let calendar = self.calendar;
        let interval = self.interval;

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                timer.tick().await;
                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                if let Err(e) = sweep_overdue(&repo, &calendar, &hub).await {
                    tracing::error!("Overdue sweep failed: {}", e);
                }
            }
            tracing::debug!("Overdue sweeper stopped");
        })
    }

    /// Signals the loop to stop before its next sweep.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
