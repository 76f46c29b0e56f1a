//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Keychain service name under which all credentials are stored.
const KEYRING_SERVICE: &str = "task-harvester";

/// Language model connectivity settings.
///
/// The API key is loaded at runtime via OS keychain or environment
/// variables, never from the TOML config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_llm_api_base")]
    pub api_base: String,
    /// Model identifier sent with every completion request.
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Upper bound on a single inference call.
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
    /// Bearer API key (populated at runtime).
    #[serde(skip)]
    pub api_key: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_llm_api_base(),
            model: default_llm_model(),
            timeout_seconds: default_llm_timeout(),
            api_key: String::new(),
        }
    }
}

impl LlmConfig {
    /// Inference timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_llm_api_base() -> String {
    "https://api.openai.com/v1".into()
}

fn default_llm_model() -> String {
    "gpt-4-turbo-preview".into()
}

fn default_llm_timeout() -> u64 {
    60
}

/// Slack channel polling settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SlackConfig {
    /// Channel whose history is scanned for task requests.
    pub channel_id: String,
    /// Delay between successful cycles.
    #[serde(default = "default_slack_interval")]
    pub poll_interval_seconds: u64,
    /// Delay after a failed cycle; defaults to the poll interval.
    #[serde(default)]
    pub error_backoff_seconds: Option<u64>,
    /// Page size for `conversations.history`.
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u16,
    /// Bot user token used for reading history (populated at runtime).
    #[serde(skip)]
    pub bot_token: String,
}

impl SlackConfig {
    /// Resolved cadence for the Slack poller.
    #[must_use]
    pub fn schedule(&self) -> PollSchedule {
        PollSchedule::new(self.poll_interval_seconds, self.error_backoff_seconds)
    }
}

fn default_slack_interval() -> u64 {
    5
}

fn default_history_page_size() -> u16 {
    100
}

/// Gmail inbox polling settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EmailConfig {
    /// Only mail from this sender is considered.
    pub sender_address: String,
    /// Base URL of the Gmail REST API.
    #[serde(default = "default_gmail_api_base")]
    pub api_base: String,
    /// OAuth token endpoint used for refresh-token exchange.
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// OAuth client identifier (public, not a secret).
    pub client_id: String,
    /// Delay between successful cycles.
    #[serde(default = "default_email_interval")]
    pub poll_interval_seconds: u64,
    /// Delay after a failed cycle; defaults to the poll interval.
    #[serde(default)]
    pub error_backoff_seconds: Option<u64>,
    /// OAuth client secret (populated at runtime).
    #[serde(skip)]
    pub client_secret: String,
    /// OAuth refresh token (populated at runtime).
    #[serde(skip)]
    pub refresh_token: String,
}

impl EmailConfig {
    /// Resolved cadence for the email poller.
    #[must_use]
    pub fn schedule(&self) -> PollSchedule {
        PollSchedule::new(self.poll_interval_seconds, self.error_backoff_seconds)
    }
}

fn default_gmail_api_base() -> String {
    "https://gmail.googleapis.com".into()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".into()
}

fn default_email_interval() -> u64 {
    10
}

/// Sleep cadence of a poller after successful and failed cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Delay after a completed cycle.
    pub interval: Duration,
    /// Delay after a cycle that ended in an error.
    pub error_backoff: Duration,
}

impl PollSchedule {
    fn new(interval_seconds: u64, backoff_seconds: Option<u64>) -> Self {
        Self {
            interval: Duration::from_secs(interval_seconds),
            error_backoff: Duration::from_secs(backoff_seconds.unwrap_or(interval_seconds)),
        }
    }
}

fn default_http_port() -> u16 {
    8000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("tasks.db")
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3001".into()]
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// `SQLite` database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Port for the task CRUD API.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Browser origins allowed to call the CRUD API.
    #[serde(default = "default_cors_origins")]
    pub cors_allowed_origins: Vec<String>,
    /// Free-form description of the requester, folded into every prompt.
    #[serde(default)]
    pub requester_profile: Option<String>,
    /// Language model settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Slack poller settings; the poller is disabled when absent.
    #[serde(default)]
    pub slack: Option<SlackConfig>,
    /// Email poller settings; the poller is disabled when absent.
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load secrets from OS keychain with env-var fallback.
    ///
    /// The LLM key is always required; channel secrets only for channels
    /// that are configured.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required credential is found in
    /// neither the keychain nor the environment.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.llm.api_key = load_credential("llm_api_key", "OPENAI_API_KEY").await?;
        if let Some(slack) = self.slack.as_mut() {
            slack.bot_token = load_credential("slack_bot_token", "SLACK_BOT_TOKEN").await?;
        }
        if let Some(email) = self.email.as_mut() {
            email.client_secret =
                load_credential("gmail_client_secret", "GMAIL_CLIENT_SECRET").await?;
            email.refresh_token =
                load_credential("gmail_refresh_token", "GMAIL_REFRESH_TOKEN").await?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.llm.model.trim().is_empty() {
            return Err(AppError::Config("llm.model must not be empty".into()));
        }
        if self.llm.timeout_seconds == 0 {
            return Err(AppError::Config(
                "llm.timeout_seconds must be greater than zero".into(),
            ));
        }

        if let Some(slack) = &self.slack {
            if slack.channel_id.trim().is_empty() {
                return Err(AppError::Config("slack.channel_id must not be empty".into()));
            }
            validate_interval("slack", slack.poll_interval_seconds)?;
            if slack.history_page_size == 0 {
                return Err(AppError::Config(
                    "slack.history_page_size must be greater than zero".into(),
                ));
            }
        }

        if let Some(email) = &self.email {
            if email.sender_address.trim().is_empty() {
                return Err(AppError::Config(
                    "email.sender_address must not be empty".into(),
                ));
            }
            if email.client_id.trim().is_empty() {
                return Err(AppError::Config("email.client_id must not be empty".into()));
            }
            validate_interval("email", email.poll_interval_seconds)?;
        }

        Ok(())
    }
}

fn validate_interval(section: &str, seconds: u64) -> Result<()> {
    if seconds == 0 {
        return Err(AppError::Config(format!(
            "{section}.poll_interval_seconds must be greater than zero"
        )));
    }
    Ok(())
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    match env::var(env_key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))),
    }
}
