//! Change events and their mapping to user-facing notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tables whose writes are published as change events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Users,
    Positions,
    Tasks,
    TaskAssignments,
    StaffProfiles,
    Outlets,
    MonthlySchedules,
    Invitations,
}

impl ChangeTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeTable::Users => "users",
            ChangeTable::Positions => "positions",
            ChangeTable::Tasks => "tasks",
            ChangeTable::TaskAssignments => "task_assignments",
            ChangeTable::StaffProfiles => "staff_profiles",
            ChangeTable::Outlets => "outlets",
            ChangeTable::MonthlySchedules => "monthly_schedules",
            ChangeTable::Invitations => "invitations",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

/// A committed write, published after the database accepted it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub action: ChangeAction,
    pub record_id: String,
    /// Snapshot of the row after the write (`null` for deletes)
    pub record: Value,
    /// Snapshot of the row before the write, for updates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_record: Option<Value>,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn insert<T: Serialize>(table: ChangeTable, record_id: &str, record: &T) -> Self {
        Self {
            table,
            action: ChangeAction::Insert,
            record_id: record_id.to_string(),
            record: snapshot(record),
            old_record: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn update<O: Serialize, N: Serialize>(
        table: ChangeTable,
        record_id: &str,
        old_record: &O,
        record: &N,
    ) -> Self {
        Self {
            table,
            action: ChangeAction::Update,
            record_id: record_id.to_string(),
            record: snapshot(record),
            old_record: Some(snapshot(old_record)),
            occurred_at: Utc::now(),
        }
    }

    /// An update whose previous state was not captured.
    pub fn modified<T: Serialize>(table: ChangeTable, record_id: &str, record: &T) -> Self {
        Self {
            table,
            action: ChangeAction::Update,
            record_id: record_id.to_string(),
            record: snapshot(record),
            old_record: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn delete(table: ChangeTable, record_id: &str) -> Self {
        Self {
            table,
            action: ChangeAction::Delete,
            record_id: record_id.to_string(),
            record: Value::Null,
            old_record: None,
            occurred_at: Utc::now(),
        }
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.record.get(name).and_then(Value::as_str)
    }

    fn old_field(&self, name: &str) -> Option<&str> {
        self.old_record
            .as_ref()
            .and_then(|old| old.get(name))
            .and_then(Value::as_str)
    }
}

fn snapshot<T: Serialize>(record: &T) -> Value {
    match serde_json::to_value(record) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Failed to snapshot change record: {}", e);
            Value::Null
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    TaskAssigned,
    TaskCompleted,
    RescheduleRequested,
    RescheduleResolved,
    TaskOverdue,
    TaskUpdated,
    ScheduleUpdated,
}

impl NotificationType {
    /// Whether clients should play the alert tone.
    pub fn plays_sound(&self) -> bool {
        matches!(
            self,
            NotificationType::TaskAssigned
                | NotificationType::TaskOverdue
                | NotificationType::RescheduleRequested
        )
    }
}

/// Who and what a notification is about; used for routing to subscribers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub table: String,
    pub record_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub data: NotificationData,
    pub sound: bool,
}

/// Map a change event to the notification it announces, if any.
pub fn notification_for(event: &ChangeEvent) -> Option<Notification> {
    let kind = notification_type(event)?;
    let task_title = event.field("taskTitle").unwrap_or("A task");

    let (title, message) = match kind {
        NotificationType::TaskAssigned => (
            "New task assigned".to_string(),
            format!("{} has been assigned", task_title),
        ),
        NotificationType::TaskCompleted => (
            "Task completed".to_string(),
            format!("{} was completed", task_title),
        ),
        NotificationType::RescheduleRequested => (
            "Reschedule requested".to_string(),
            match event.field("rescheduleReason") {
                Some(reason) => format!("{}: {}", task_title, reason),
                None => format!("{} needs a new due date", task_title),
            },
        ),
        NotificationType::RescheduleResolved => {
            let moved = event.field("dueDate") != event.old_field("dueDate");
            (
                "Reschedule resolved".to_string(),
                if moved {
                    format!("New due date approved for {}", task_title)
                } else {
                    format!("Reschedule of {} was declined", task_title)
                },
            )
        }
        NotificationType::TaskOverdue => (
            "Task overdue".to_string(),
            format!("{} is past its due date", task_title),
        ),
        NotificationType::TaskUpdated => (
            "Task updated".to_string(),
            format!("{} was updated", event.field("title").unwrap_or("A task")),
        ),
        NotificationType::ScheduleUpdated => (
            "Schedule updated".to_string(),
            "Your monthly schedule changed".to_string(),
        ),
    };

    Some(Notification {
        id: uuid::Uuid::new_v4().to_string(),
        kind,
        title,
        message,
        timestamp: event.occurred_at,
        data: NotificationData {
            table: event.table.as_str().to_string(),
            record_id: event.record_id.clone(),
            staff_id: event.field("staffId").map(str::to_string),
            outlet_id: event.field("outletId").map(str::to_string),
            task_id: event.field("taskId").map(str::to_string),
        },
        sound: kind.plays_sound(),
    })
}

fn notification_type(event: &ChangeEvent) -> Option<NotificationType> {
    match (event.table, event.action) {
        (ChangeTable::TaskAssignments, ChangeAction::Insert) => {
            Some(NotificationType::TaskAssigned)
        }
        (ChangeTable::TaskAssignments, ChangeAction::Update) => {
            let new = event.field("status")?;
            let old = event.old_field("status");
            if old == Some(new) {
                return None;
            }
            match (old, new) {
                (_, "completed") => Some(NotificationType::TaskCompleted),
                (_, "overdue") => Some(NotificationType::TaskOverdue),
                (_, "reschedule_requested") => Some(NotificationType::RescheduleRequested),
                (Some("reschedule_requested"), _) => Some(NotificationType::RescheduleResolved),
                _ => None,
            }
        }
        (ChangeTable::Tasks, ChangeAction::Update) => Some(NotificationType::TaskUpdated),
        (ChangeTable::MonthlySchedules, ChangeAction::Insert | ChangeAction::Update) => {
            Some(NotificationType::ScheduleUpdated)
        }
        _ => None,
    }
}
