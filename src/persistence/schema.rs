//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS` so the DDL is
//! safe to re-run on every startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS task (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    title           TEXT NOT NULL,
    description     TEXT,
    due_date        TEXT,
    status          TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending','in_progress','completed')),
    owner           TEXT,
    source          TEXT CHECK(source IS NULL OR source IN ('slack','email')),
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS client (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    slack_id        TEXT UNIQUE,
    email           TEXT UNIQUE,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS processed_slack_message (
    external_key    TEXT PRIMARY KEY NOT NULL,
    processed_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS processed_email (
    external_key    TEXT PRIMARY KEY NOT NULL,
    processed_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_task_source ON task(source);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
