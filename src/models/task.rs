//! Task templates.

use serde::{Deserialize, Serialize};

/// How often a recurring task repeats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecurringPattern {
    Daily,
    Weekly,
    Monthly,
}

impl RecurringPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurringPattern::Daily => "daily",
            RecurringPattern::Weekly => "weekly",
            RecurringPattern::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(RecurringPattern::Daily),
            "weekly" => Some(RecurringPattern::Weekly),
            "monthly" => Some(RecurringPattern::Monthly),
            _ => None,
        }
    }
}

/// A task template. Assignments hand it out to staff or outlets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub estimated_minutes: i64,
    pub is_recurring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring_pattern: Option<RecurringPattern>,
    pub is_high_priority: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

/// Request body for creating a task.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub estimated_minutes: i64,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurring_pattern: Option<RecurringPattern>,
    #[serde(default)]
    pub is_high_priority: bool,
}

/// Request body for updating a task.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_minutes: Option<i64>,
    #[serde(default)]
    pub is_recurring: Option<bool>,
    #[serde(default)]
    pub recurring_pattern: Option<RecurringPattern>,
    #[serde(default)]
    pub is_high_priority: Option<bool>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Check the fields every stored task must satisfy.
pub fn validate_task_fields(
    title: &str,
    estimated_minutes: i64,
    is_recurring: bool,
    recurring_pattern: Option<RecurringPattern>,
) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Title is required".to_string());
    }
    if estimated_minutes <= 0 {
        return Err("Estimated minutes must be greater than zero".to_string());
    }
    if is_recurring && recurring_pattern.is_none() {
        return Err("Recurring tasks need a recurring pattern".to_string());
    }
    Ok(())
}
