//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing, validation, or credential loading failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Slack Web API failure (rate limit, auth, transport).
    Slack(String),
    /// Mailbox API failure (rate limit, auth, transport).
    Email(String),
    /// Language model request failure.
    Llm(String),
    /// An external service refused one message's content; other messages
    /// are unaffected.
    Rejected(String),
    /// Model output could not be parsed as task data.
    Malformed(String),
    /// Caller-supplied input failed validation.
    InvalidInput(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Entity conflicts with an existing unique value.
    Conflict(String),
    /// An external call exceeded its time budget.
    Timeout(String),
    /// Outbound HTTP transport failure.
    Http(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Slack(msg) => write!(f, "slack: {msg}"),
            Self::Email(msg) => write!(f, "email: {msg}"),
            Self::Llm(msg) => write!(f, "llm: {msg}"),
            Self::Rejected(msg) => write!(f, "rejected: {msg}"),
            Self::Malformed(msg) => write!(f, "malformed: {msg}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Conflict(msg) => write!(f, "conflict: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Http(msg) => write!(f, "http: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Whether the failure is confined to a single message.
    ///
    /// Pollers skip past such failures and keep the message unmarked;
    /// every other error ends the cycle.
    #[must_use]
    pub fn is_message_scoped(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Whether an HTTP status refuses the request content rather than the
/// caller. Auth failures, a missing endpoint, rate limits and request
/// timeouts affect every message and do not count.
#[must_use]
pub fn rejects_content(status: reqwest::StatusCode) -> bool {
    status.is_client_error() && !matches!(status.as_u16(), 401 | 403 | 404 | 408 | 429)
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
