//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all application data.

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
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS password_resets (
            account_id TEXT PRIMARY KEY,
            token TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS groups (
            group_code TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            member_count INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS admin_codes (
            admin_code TEXT PRIMARY KEY,
            group_code TEXT NOT NULL UNIQUE
        );
        "#,
    )
    .execute(pool)
    .await?;

    // group_id is NULL for a freshly registered admin until group setup
    // migrates the profile into its group.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS members (
            id TEXT PRIMARY KEY,
            account_id TEXT,
            group_id TEXT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT NOT NULL,
            role TEXT NOT NULL,
            amount TEXT NOT NULL DEFAULT '0',
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ledger_entries (
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            member_id TEXT NOT NULL,
            member_name TEXT NOT NULL,
            amount TEXT NOT NULL,
            new_balance TEXT NOT NULL,
            event TEXT NOT NULL,
            entry_type TEXT NOT NULL,
            date TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS activities (
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            activity_name TEXT NOT NULL,
            activity_date TEXT NOT NULL,
            total_expense TEXT NOT NULL,
            expense_per_head TEXT NOT NULL,
            members_checked TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // The duplicate scans give the friendly error messages; these unique
    // indexes make the check-then-write race lose safely.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_members_group_name
            ON members(group_id, lower(trim(first_name))) WHERE group_id IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_members_group_phone
            ON members(group_id, phone) WHERE group_id IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_members_group_email
            ON members(group_id, email) WHERE group_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_members_account ON members(account_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_account ON sessions(account_id);
        CREATE INDEX IF NOT EXISTS idx_ledger_group_date ON ledger_entries(group_id, date);
        CREATE INDEX IF NOT EXISTS idx_ledger_member ON ledger_entries(member_id);
        CREATE INDEX IF NOT EXISTS idx_activities_group_name ON activities(group_id, activity_name);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
