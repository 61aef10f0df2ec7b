//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all application data.

mod assignments;
mod invitations;
mod outlets;
mod repository;
mod schedules;
mod staff;
mod tasks;

pub use assignments::NewAssignment;
pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS outlets (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            address TEXT,
            phone TEXT,
            email TEXT,
            manager_name TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('admin', 'staff', 'outlet')),
            outlet_id TEXT REFERENCES outlets(id) ON DELETE SET NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS positions (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS staff_profiles (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
            position_id TEXT REFERENCES positions(id) ON DELETE SET NULL,
            employee_id TEXT NOT NULL UNIQUE,
            hire_date TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            estimated_minutes INTEGER NOT NULL CHECK (estimated_minutes > 0),
            is_recurring INTEGER NOT NULL DEFAULT 0,
            recurring_pattern TEXT,
            is_high_priority INTEGER NOT NULL DEFAULT 0,
            created_by TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS task_assignments (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            staff_id TEXT REFERENCES staff_profiles(id) ON DELETE CASCADE,
            outlet_id TEXT REFERENCES outlets(id) ON DELETE CASCADE,
            assigned_date TEXT NOT NULL,
            due_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'completed', 'overdue', 'reschedule_requested')),
            completed_at TEXT,
            completion_proof TEXT,
            completion_notes TEXT,
            minutes_deducted INTEGER,
            requested_due_date TEXT,
            reschedule_reason TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            CHECK (staff_id IS NOT NULL OR outlet_id IS NOT NULL)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS monthly_schedules (
            id TEXT PRIMARY KEY,
            staff_id TEXT NOT NULL REFERENCES staff_profiles(id) ON DELETE CASCADE,
            month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
            year INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (staff_id, month, year)
        );

        CREATE TABLE IF NOT EXISTS daily_schedules (
            id TEXT PRIMARY KEY,
            schedule_id TEXT NOT NULL REFERENCES monthly_schedules(id) ON DELETE CASCADE,
            date TEXT NOT NULL,
            outlet_id TEXT REFERENCES outlets(id) ON DELETE SET NULL,
            time_in TEXT,
            time_out TEXT,
            is_day_off INTEGER NOT NULL DEFAULT 0,
            UNIQUE (schedule_id, date)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS invitations (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('admin', 'staff', 'outlet')),
            outlet_id TEXT REFERENCES outlets(id) ON DELETE SET NULL,
            token TEXT NOT NULL UNIQUE,
            invited_by TEXT,
            expires_at TEXT NOT NULL,
            used_at TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_assignments_status ON task_assignments(status);
        CREATE INDEX IF NOT EXISTS idx_assignments_staff ON task_assignments(staff_id);
        CREATE INDEX IF NOT EXISTS idx_assignments_outlet ON task_assignments(outlet_id);
        CREATE INDEX IF NOT EXISTS idx_assignments_task ON task_assignments(task_id);
        CREATE INDEX IF NOT EXISTS idx_schedules_period ON monthly_schedules(year, month);
        CREATE INDEX IF NOT EXISTS idx_invitations_email ON invitations(email);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
