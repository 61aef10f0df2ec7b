//! Monthly staff rosters.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Format of `timeIn` / `timeOut`.
pub const SHIFT_TIME_FORMAT: &str = "%H:%M";

/// One staff member's roster for a month.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySchedule {
    pub id: String,
    pub staff_id: String,
    pub month: u32,
    pub year: i32,
    pub days: Vec<DailySchedule>,
    pub created_at: String,
    pub updated_at: String,
}

/// A single rostered day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySchedule {
    pub id: String,
    pub schedule_id: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_out: Option<String>,
    pub is_day_off: bool,
}

/// A day entry as submitted by a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayEntry {
    pub date: NaiveDate,
    #[serde(default)]
    pub outlet_id: Option<String>,
    #[serde(default)]
    pub time_in: Option<String>,
    #[serde(default)]
    pub time_out: Option<String>,
    #[serde(default)]
    pub is_day_off: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleRequest {
    pub staff_id: String,
    pub month: u32,
    pub year: i32,
    #[serde(default)]
    pub days: Vec<DayEntry>,
}

/// Replaces the given days of a schedule; other days are left alone.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateScheduleDaysRequest {
    pub days: Vec<DayEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    pub month: u32,
    pub year: i32,
    #[serde(default)]
    pub staff_id: Option<String>,
}

/// Check month/year and every day entry of a roster.
pub fn validate_schedule(month: u32, year: i32, days: &[DayEntry]) -> Result<(), String> {
    if !(1..=12).contains(&month) {
        return Err(format!("Month must be between 1 and 12, got {}", month));
    }
    if !(2000..=2100).contains(&year) {
        return Err(format!("Year {} is out of range", year));
    }

    let mut seen = HashSet::new();
    for day in days {
        if day.date.month() != month || day.date.year() != year {
            return Err(format!("{} is not in {:04}-{:02}", day.date, year, month));
        }
        if !seen.insert(day.date) {
            return Err(format!("{} appears more than once", day.date));
        }
        validate_day(day)?;
    }
    Ok(())
}

fn validate_day(day: &DayEntry) -> Result<(), String> {
    if day.is_day_off {
        if day.outlet_id.is_some() || day.time_in.is_some() || day.time_out.is_some() {
            return Err(format!("{} is a day off and cannot have a shift", day.date));
        }
        return Ok(());
    }

    let time_in = day.time_in.as_deref().map(parse_shift_time).transpose()?;
    let time_out = day.time_out.as_deref().map(parse_shift_time).transpose()?;
    if let (Some(time_in), Some(time_out)) = (time_in, time_out) {
        if time_in >= time_out {
            return Err(format!("{}: time in must be before time out", day.date));
        }
    }
    Ok(())
}

fn parse_shift_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, SHIFT_TIME_FORMAT)
        .map_err(|_| format!("Invalid time {:?}, expected HH:MM", s))
}
