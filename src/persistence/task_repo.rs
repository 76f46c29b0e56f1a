//! Task repository for `SQLite` persistence.
//!
//! Every method opens and closes its own transaction; nothing is held
//! across calls.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::task::{NewTask, Task, TaskPatch, TaskSource, TaskStatus};
use crate::{AppError, Result};

use super::db::Database;

/// Repository for task records.
#[derive(Clone)]
pub struct TaskRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct TaskRow {
    id: i64,
    title: String,
    description: Option<String>,
    due_date: Option<String>,
    status: String,
    owner: Option<String>,
    source: Option<String>,
    created_at: String,
}

impl TaskRow {
    fn into_task(self) -> Result<Task> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| AppError::Db(format!("invalid created_at: {e}")))?
            .with_timezone(&Utc);

        Ok(Task {
            id: self.id,
            title: self.title,
            description: self.description.unwrap_or_default(),
            due_date: self.due_date,
            status: TaskStatus::parse(&self.status)?,
            owner: self.owner,
            source: self.source.as_deref().map(TaskSource::parse).transpose()?,
            created_at,
        })
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, title, description, due_date, status, owner, source, created_at FROM task";

impl TaskRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a task inside its own transaction.
    ///
    /// A failed insert or commit rolls the transaction back when it drops.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert or commit fails.
    pub async fn create(&self, task: &NewTask) -> Result<Task> {
        let created_at = Utc::now();
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            "INSERT INTO task (title, description, due_date, status, owner, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.due_date)
        .bind(task.status.as_str())
        .bind(&task.owner)
        .bind(task.source.map(TaskSource::as_str))
        .bind(created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Task {
            id: result.last_insert_rowid(),
            title: task.title.clone(),
            description: task.description.clone(),
            due_date: task.due_date.clone(),
            status: task.status,
            owner: task.owner.clone(),
            source: task.source,
            created_at,
        })
    }

    /// Retrieve a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no task has this id.
    pub async fn get_by_id(&self, id: i64) -> Result<Task> {
        let row: Option<TaskRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.ok_or_else(|| AppError::NotFound(format!("task {id} not found")))?
            .into_task()
    }

    /// List every task, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))
            .fetch_all(self.db.as_ref())
            .await?;

        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// List tasks inferred from one channel, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_by_source(&self, source: TaskSource) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE source = ?1 ORDER BY id ASC"))
                .bind(source.as_str())
                .fetch_all(self.db.as_ref())
                .await?;

        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// Apply a partial update and return the stored result.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no task has this id, or
    /// `AppError::Db` if the update fails.
    pub async fn update(&self, id: i64, patch: TaskPatch) -> Result<Task> {
        let mut tx = self.db.begin().await?;

        let row: Option<TaskRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut task = row
            .ok_or_else(|| AppError::NotFound(format!("task {id} not found")))?
            .into_task()?;

        patch.apply(&mut task);

        sqlx::query(
            "UPDATE task SET title = ?1, description = ?2, due_date = ?3, status = ?4, owner = ?5
             WHERE id = ?6",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.due_date)
        .bind(task.status.as_str())
        .bind(&task.owner)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(task)
    }

    /// Delete a task. Only the CRUD API calls this; pollers never delete.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no task has this id.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM task WHERE id = ?1")
            .bind(id)
            .execute(self.db.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("task {id} not found")));
        }
        Ok(())
    }
}
