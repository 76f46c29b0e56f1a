//! Processed-message ledger repository.
//!
//! Append-only: keys are inserted once and never deleted by the pollers.

use std::sync::Arc;

use chrono::Utc;

use crate::models::ledger::Ledger;
use crate::Result;

use super::db::Database;

/// Repository over both per-channel dedup ledgers.
#[derive(Clone)]
pub struct LedgerRepo {
    db: Arc<Database>,
}

impl LedgerRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Whether `key` is already recorded in `ledger`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn is_processed(&self, ledger: Ledger, key: &str) -> Result<bool> {
        // `table()` yields compile-time literals, never caller input.
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE external_key = ?1",
            ledger.table()
        );
        let (count,): (i64,) = sqlx::query_as(&query)
            .bind(key)
            .fetch_one(self.db.as_ref())
            .await?;
        Ok(count > 0)
    }

    /// Record `key` in `ledger` if absent.
    ///
    /// Returns `true` when the key was newly inserted and `false` when it
    /// was already present.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn mark_processed(&self, ledger: Ledger, key: &str) -> Result<bool> {
        let query = format!(
            "INSERT OR IGNORE INTO {} (external_key, processed_at) VALUES (?1, ?2)",
            ledger.table()
        );
        let result = sqlx::query(&query)
            .bind(key)
            .bind(Utc::now().to_rfc3339())
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Number of keys recorded in `ledger`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count(&self, ledger: Ledger) -> Result<i64> {
        let query = format!("SELECT COUNT(*) FROM {}", ledger.table());
        let (count,): (i64,) = sqlx::query_as(&query).fetch_one(self.db.as_ref()).await?;
        Ok(count)
    }
}
