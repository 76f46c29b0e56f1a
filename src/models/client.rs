//! Client registry model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A known requester, reachable by Slack id and/or email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Client {
    /// Store-generated identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Slack user id; unique when present.
    pub slack_id: Option<String>,
    /// Email address; unique when present.
    pub email: Option<String>,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
}

/// Registration payload for a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewClient {
    /// Display name.
    pub name: String,
    /// Slack user id.
    #[serde(default)]
    pub slack_id: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
}
