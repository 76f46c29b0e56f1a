//! Client registry repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::client::{Client, NewClient};
use crate::{AppError, Result};

use super::db::Database;

/// Repository for client registry records.
#[derive(Clone)]
pub struct ClientRepo {
    db: Arc<Database>,
}

#[derive(sqlx::FromRow)]
struct ClientRow {
    id: i64,
    name: String,
    slack_id: Option<String>,
    email: Option<String>,
    created_at: String,
}

impl ClientRow {
    fn into_client(self) -> Result<Client> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| AppError::Db(format!("invalid created_at: {e}")))?
            .with_timezone(&Utc);

        Ok(Client {
            id: self.id,
            name: self.name,
            slack_id: self.slack_id,
            email: self.email,
            created_at,
        })
    }
}

/// Map a unique-constraint violation to the conflicting field.
fn conflict_or_db(err: sqlx::Error) -> AppError {
    match err.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => {
            if db_err.message().contains("client.email") {
                AppError::Conflict("email already exists".into())
            } else {
                AppError::Conflict("slack id already exists".into())
            }
        }
        _ => AppError::from(err),
    }
}

impl ClientRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Register a client, rejecting duplicate Slack ids and emails.
    ///
    /// Uniqueness is enforced by the table's `UNIQUE` constraints, so
    /// concurrent registrations of the same id cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` if the Slack id or email is already
    /// registered, or `AppError::Db` if the insert fails.
    pub async fn register(&self, client: &NewClient) -> Result<Client> {
        let slack_id = client.slack_id.as_deref().filter(|s| !s.is_empty());
        let email = client.email.as_deref().filter(|s| !s.is_empty());
        let created_at = Utc::now();

        let result = sqlx::query(
            "INSERT INTO client (name, slack_id, email, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&client.name)
        .bind(slack_id)
        .bind(email)
        .bind(created_at.to_rfc3339())
        .execute(self.db.as_ref())
        .await
        .map_err(conflict_or_db)?;

        Ok(Client {
            id: result.last_insert_rowid(),
            name: client.name.clone(),
            slack_id: slack_id.map(str::to_owned),
            email: email.map(str::to_owned),
            created_at,
        })
    }

    /// List all registered clients.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Client>> {
        let rows: Vec<ClientRow> = sqlx::query_as(
            "SELECT id, name, slack_id, email, created_at FROM client ORDER BY id ASC",
        )
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(ClientRow::into_client).collect()
    }
}
