//! `SQLite` connection pool setup and schema bootstrap.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::{AppError, Result};

use super::schema;

/// Alias for the shared `SQLite` pool.
pub type Database = SqlitePool;

const MAX_CONNECTIONS: u32 = 5;

/// Open (creating if missing) the file-backed database and apply the schema.
///
/// # Errors
///
/// Returns `AppError::Db` if the directory, connection, or schema setup fails.
pub async fn connect(path: impl AsRef<Path>) -> Result<Database> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|err| AppError::Db(format!("failed to create db dir: {err}")))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    schema::bootstrap_schema(&pool).await?;
    Ok(pool)
}

/// Open a private in-memory database with the schema applied.
///
/// The pool is capped at one connection so every query sees the same
/// in-memory database.
///
/// # Errors
///
/// Returns `AppError::Db` if the connection or schema setup fails.
pub async fn connect_memory() -> Result<Database> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    schema::bootstrap_schema(&pool).await?;
    Ok(pool)
}
