//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all application data. State-machine
//! guards that must hold under concurrency (one attendance row per employee
//! per day, unique permission tuples) are uniqueness constraints here; the
//! in-code existence checks only improve error messages.

mod repository;

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
        CREATE TABLE IF NOT EXISTS employees (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            name TEXT NOT NULL,
            email TEXT,
            department_id TEXT,
            role_id TEXT,
            manager_id TEXT,
            status TEXT NOT NULL DEFAULT 'ACTIVE',
            auto_assign_enabled INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS roles (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS permissions (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            resource TEXT NOT NULL,
            action TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            UNIQUE (company_id, resource, action)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS role_permissions (
            role_id TEXT NOT NULL,
            permission_id TEXT NOT NULL,
            UNIQUE (role_id, permission_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            name TEXT NOT NULL,
            phone TEXT,
            email TEXT,
            source TEXT,
            status TEXT NOT NULL DEFAULT 'NEW',
            priority INTEGER NOT NULL DEFAULT 0,
            assigned_to_id TEXT,
            assigned_at TEXT,
            contacted_at TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lead_history (
            id TEXT PRIMARY KEY,
            lead_id TEXT NOT NULL,
            action TEXT NOT NULL,
            performed_by TEXT,
            previous_assignee_id TEXT,
            new_assignee_id TEXT,
            note TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            employee_id TEXT,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            type TEXT NOT NULL,
            category TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS geofence_locations (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            name TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            radius_meters REAL NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            employee_id TEXT NOT NULL,
            day TEXT NOT NULL,
            check_in_at TEXT NOT NULL,
            check_out_at TEXT,
            check_in_lat REAL,
            check_in_lng REAL,
            check_out_lat REAL,
            check_out_lng REAL,
            address TEXT,
            notes TEXT,
            status TEXT NOT NULL,
            total_hours REAL,
            break_minutes INTEGER NOT NULL DEFAULT 0,
            is_verified INTEGER NOT NULL DEFAULT 0,
            UNIQUE (employee_id, day)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes for the engine's hot queries
    sqlx::raw_sql(
        r#"
        CREATE INDEX IF NOT EXISTS idx_leads_assigned_to ON leads(assigned_to_id);
        CREATE INDEX IF NOT EXISTS idx_leads_company_status ON leads(company_id, status);
        CREATE INDEX IF NOT EXISTS idx_employees_company ON employees(company_id);
        CREATE INDEX IF NOT EXISTS idx_employees_department ON employees(department_id);
        CREATE INDEX IF NOT EXISTS idx_history_lead ON lead_history(lead_id);
        CREATE INDEX IF NOT EXISTS idx_notifications_company ON notifications(company_id, employee_id);
        CREATE INDEX IF NOT EXISTS idx_geofences_company ON geofence_locations(company_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
