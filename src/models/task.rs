//! Task model shared by the pollers and the CRUD API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Progress state of a task.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started; every inferred task begins here.
    #[default]
    Pending,
    /// Work has begun.
    InProgress,
    /// Finished.
    #[serde(alias = "done")]
    Completed,
}

impl TaskStatus {
    /// Stored text representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// Parse the stored text representation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` for unknown values.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" | "done" => Ok(Self::Completed),
            other => Err(AppError::Db(format!("invalid task status: {other}"))),
        }
    }
}

/// Ingestion channel a task was inferred from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    /// Slack channel message.
    Slack,
    /// Email from the monitored sender.
    Email,
}

impl TaskSource {
    /// Stored text representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::Email => "email",
        }
    }

    /// Parse the stored text representation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` for unknown values.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "slack" => Ok(Self::Slack),
            "email" => Ok(Self::Email),
            other => Err(AppError::Db(format!("invalid task source: {other}"))),
        }
    }
}

/// A persisted task.
///
/// `due_date` is kept as the free text the model or user supplied; it is
/// never parsed into a calendar type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    /// Store-generated identifier.
    pub id: i64,
    /// Short summary of the request.
    pub title: String,
    /// Details, or a JSON-encoded clarification question list.
    pub description: String,
    /// Free-form due date text.
    pub due_date: Option<String>,
    /// Progress state.
    pub status: TaskStatus,
    /// Requester identifier: Slack user id or email address.
    pub owner: Option<String>,
    /// Channel the task came from; empty for manual entries.
    pub source: Option<TaskSource>,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
}

/// Task fields supplied on insert; id and `created_at` come from the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTask {
    /// Short summary of the request.
    #[serde(default)]
    pub title: String,
    /// Details or clarification questions.
    #[serde(default)]
    pub description: String,
    /// Free-form due date text.
    #[serde(default)]
    pub due_date: Option<String>,
    /// Initial progress state.
    #[serde(default)]
    pub status: TaskStatus,
    /// Requester identifier.
    #[serde(default)]
    pub owner: Option<String>,
    /// Originating channel.
    #[serde(default)]
    pub source: Option<TaskSource>,
}

/// Partial update applied by the CRUD API; absent fields are left alone.
///
/// `due_date` and `owner` distinguish an absent key (`None`) from an
/// explicit `null` (`Some(None)`), which clears the field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskPatch {
    /// Replacement title.
    pub title: Option<String>,
    /// Replacement description.
    pub description: Option<String>,
    /// Replacement due date text, or `Some(None)` to clear it.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<String>>,
    /// Replacement status.
    pub status: Option<TaskStatus>,
    /// Replacement owner, or `Some(None)` to clear it.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub owner: Option<Option<String>>,
}

/// Wrap a key that is present in the body, so `null` becomes `Some(None)`.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl TaskPatch {
    /// Apply the patch onto an existing task.
    pub fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(owner) = self.owner {
            task.owner = owner;
        }
    }
}
