//! Processed-message ledgers, one per ingestion channel.

use crate::models::task::TaskSource;

/// Selects which dedup ledger an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ledger {
    /// Keys are Slack message timestamps.
    Slack,
    /// Keys are Gmail message ids.
    Email,
}

impl Ledger {
    /// Backing table name.
    #[must_use]
    pub fn table(self) -> &'static str {
        match self {
            Self::Slack => "processed_slack_message",
            Self::Email => "processed_email",
        }
    }

    /// Task source recorded for tasks inferred from this channel.
    #[must_use]
    pub fn source(self) -> TaskSource {
        match self {
            Self::Slack => TaskSource::Slack,
            Self::Email => TaskSource::Email,
        }
    }
}
