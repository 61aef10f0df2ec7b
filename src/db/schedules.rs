//! Monthly and daily schedule persistence.

use chrono::{NaiveDate, Utc};
use sqlx::{Row, Sqlite, Transaction};

use super::Repository;
use crate::errors::AppError;
use crate::models::{CreateScheduleRequest, DailySchedule, DayEntry, MonthlySchedule};

impl Repository {
    /// List schedules for a month, optionally for one staff member.
    pub async fn list_schedules(
        &self,
        month: u32,
        year: i32,
        staff_id: Option<&str>,
    ) -> Result<Vec<MonthlySchedule>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, staff_id, month, year, created_at, updated_at
               FROM monthly_schedules
               WHERE month = ? AND year = ? AND (? IS NULL OR staff_id = ?)
               ORDER BY staff_id"#,
        )
        .bind(month as i64)
        .bind(year)
        .bind(staff_id)
        .bind(staff_id)
        .fetch_all(&self.pool)
        .await?;

        let mut schedules = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut schedule = schedule_from_row(row);
            schedule.days = self.list_days(&schedule.id).await?;
            schedules.push(schedule);
        }
        Ok(schedules)
    }

    /// Get a schedule with its days.
    pub async fn get_schedule(&self, id: &str) -> Result<Option<MonthlySchedule>, AppError> {
        let row = sqlx::query(
            "SELECT id, staff_id, month, year, created_at, updated_at FROM monthly_schedules WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut schedule = schedule_from_row(&row);
                schedule.days = self.list_days(&schedule.id).await?;
                Ok(Some(schedule))
            }
            None => Ok(None),
        }
    }

    /// Create a monthly schedule and its days in one transaction.
    pub async fn create_schedule(
        &self,
        request: &CreateScheduleRequest,
    ) -> Result<MonthlySchedule, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(
            "SELECT id FROM monthly_schedules WHERE staff_id = ? AND month = ? AND year = ?",
        )
        .bind(&request.staff_id)
        .bind(request.month as i64)
        .bind(request.year)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_some() {
            return Err(AppError::Conflict(format!(
                "Staff {} already has a schedule for {:04}-{:02}",
                request.staff_id, request.year, request.month
            )));
        }

        sqlx::query(
            "INSERT INTO monthly_schedules (id, staff_id, month, year, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&request.staff_id)
        .bind(request.month as i64)
        .bind(request.year)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        upsert_days(&mut tx, &id, &request.days).await?;
        bump_revision(&mut tx, &now).await?;
        tx.commit().await?;

        self.get_schedule(&id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Schedule {} vanished after insert", id)))
    }

    /// Replace the given days of a schedule.
    pub async fn update_schedule_days(
        &self,
        id: &str,
        days: &[DayEntry],
    ) -> Result<MonthlySchedule, AppError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE monthly_schedules SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Schedule {} not found", id)));
        }

        upsert_days(&mut tx, id, days).await?;
        bump_revision(&mut tx, &now).await?;
        tx.commit().await?;

        self.get_schedule(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Schedule {} not found", id)))
    }

    /// Delete a schedule and its days.
    pub async fn delete_schedule(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM monthly_schedules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Schedule {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }

    async fn list_days(&self, schedule_id: &str) -> Result<Vec<DailySchedule>, AppError> {
        let rows = sqlx::query(
            "SELECT id, schedule_id, date, outlet_id, time_in, time_out, is_day_off FROM daily_schedules WHERE schedule_id = ? ORDER BY date",
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(day_from_row).collect())
    }
}

async fn upsert_days(
    tx: &mut Transaction<'_, Sqlite>,
    schedule_id: &str,
    days: &[DayEntry],
) -> Result<(), AppError> {
    for day in days {
        sqlx::query(
            r#"INSERT INTO daily_schedules (id, schedule_id, date, outlet_id, time_in, time_out, is_day_off)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (schedule_id, date) DO UPDATE SET
                   outlet_id = excluded.outlet_id,
                   time_in = excluded.time_in,
                   time_out = excluded.time_out,
                   is_day_off = excluded.is_day_off"#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(schedule_id)
        .bind(day.date)
        .bind(&day.outlet_id)
        .bind(&day.time_in)
        .bind(&day.time_out)
        .bind(day.is_day_off as i32)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn bump_revision(tx: &mut Transaction<'_, Sqlite>, now: &str) -> Result<(), AppError> {
    sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
        .bind(now)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn schedule_from_row(row: &sqlx::sqlite::SqliteRow) -> MonthlySchedule {
    let month: i64 = row.get("month");
    MonthlySchedule {
        id: row.get("id"),
        staff_id: row.get("staff_id"),
        month: month as u32,
        year: row.get("year"),
        days: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn day_from_row(row: &sqlx::sqlite::SqliteRow) -> DailySchedule {
    let date: NaiveDate = row.get("date");
    let is_day_off: i32 = row.get("is_day_off");
    DailySchedule {
        id: row.get("id"),
        schedule_id: row.get("schedule_id"),
        date,
        outlet_id: row.get("outlet_id"),
        time_in: row.get("time_in"),
        time_out: row.get("time_out"),
        is_day_off: is_day_off != 0,
    }
}
