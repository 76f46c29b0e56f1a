//! Gmail inbox reader and message content extraction.

use std::time::{Duration, Instant};

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::EmailConfig;
use crate::errors::rejects_content;
use crate::inference::BoxFuture;
use crate::{AppError, Result};

/// Gmail encodes bodies as URL-safe base64, with or without padding.
const GMAIL_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const DEFAULT_SUBJECT: &str = "No Subject";
const DEFAULT_SENDER: &str = "Unknown Sender";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Refresh access tokens this long before they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Decoded content of one email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Mailbox message id; doubles as the dedup key.
    pub id: String,
    /// Subject header, or a placeholder when absent.
    pub subject: String,
    /// Raw `From` header, or a placeholder when absent.
    pub sender: String,
    /// Best-effort plain body; empty when none could be found.
    pub body: String,
}

/// Read access to a mailbox without a cursor.
pub trait MailSource: Send + Sync {
    /// List ids of all messages from `sender_address`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Email` or `AppError::Http` on API failures.
    fn list_messages_from_sender<'a>(
        &'a self,
        sender_address: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>>>;

    /// Fetch and decode one message.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Rejected` when this message alone cannot be
    /// fetched, and `AppError::Email` or `AppError::Http` on other API
    /// failures.
    fn get_message<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<EmailMessage>>;
}

/// Wire shape of a Gmail message resource (`format=full`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    /// Message id.
    pub id: String,
    /// Top-level MIME part.
    #[serde(default)]
    pub payload: Option<GmailPart>,
}

/// A MIME part of a Gmail message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailPart {
    /// Part headers.
    #[serde(default)]
    pub headers: Vec<GmailHeader>,
    /// Inline body, if any.
    #[serde(default)]
    pub body: Option<GmailBody>,
    /// Child parts for multipart messages.
    #[serde(default)]
    pub parts: Vec<GmailPart>,
}

/// A single message header.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GmailHeader {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// Encoded body data of a part.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GmailBody {
    /// URL-safe base64 payload.
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Decode the message's subject, sender and body.
///
/// The body is taken from the inline payload, else from the first part,
/// else it is empty. Undecodable data also yields an empty body.
#[must_use]
pub fn extract_email(message: &GmailMessage) -> EmailMessage {
    let payload = message.payload.clone().unwrap_or_default();

    let inline = payload.body.as_ref().and_then(|b| b.data.as_deref());
    let first_part = payload
        .parts
        .first()
        .and_then(|part| part.body.as_ref())
        .and_then(|b| b.data.as_deref());

    let body = inline
        .filter(|data| !data.is_empty())
        .or(first_part)
        .map(decode_body)
        .unwrap_or_default();

    EmailMessage {
        id: message.id.clone(),
        subject: header(&payload, "Subject").unwrap_or_else(|| DEFAULT_SUBJECT.to_owned()),
        sender: header(&payload, "From").unwrap_or_else(|| DEFAULT_SENDER.to_owned()),
        body,
    }
}

fn header(part: &GmailPart, name: &str) -> Option<String> {
    part.headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

fn decode_body(data: &str) -> String {
    match GMAIL_BASE64.decode(data.trim()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            warn!(%err, "email body is not valid base64; treating as empty");
            String::new()
        }
    }
}

/// Extract the bare address from a `From` header such as
/// `Alice <alice@example.com>`.
#[must_use]
pub fn sender_address(from: &str) -> String {
    let trimmed = from.trim();
    match (trimmed.rfind('<'), trimmed.rfind('>')) {
        (Some(open), Some(close)) if open < close => trimmed
            .get(open + 1..close)
            .map_or_else(|| trimmed.to_owned(), |addr| addr.trim().to_owned()),
        _ => trimmed.to_owned(),
    }
}

/// [`MailSource`] backed by the Gmail REST API with OAuth refresh.
pub struct GmailSource {
    http: Client,
    api_base: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    access: Mutex<Option<(String, Instant)>>,
}

impl GmailSource {
    /// Build a Gmail reader from email settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Email` if the HTTP client cannot be constructed.
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| AppError::Email(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
            access: Mutex::new(None),
        })
    }

    /// Return a cached access token, refreshing it when near expiry.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.access.lock().await;
        if let Some((token, expires_at)) = cached.as_ref() {
            if *expires_at > Instant::now() + TOKEN_EXPIRY_MARGIN {
                return Ok(token.clone());
            }
        }

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Email(format!("token refresh returned {status}: {detail}")));
        }

        let token: TokenResponse = response.json().await?;
        info!(expires_in = token.expires_in, "gmail access token refreshed");
        let expires_at = Instant::now() + Duration::from_secs(token.expires_in);
        *cached = Some((token.access_token.clone(), expires_at));
        Ok(token.access_token)
    }

    /// GET a Gmail resource as JSON.
    ///
    /// With `single_message` set, a missing or refused message is reported
    /// as `AppError::Rejected` so callers can move on to the next one.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        single_message: bool,
    ) -> Result<T> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let msg = format!("gmail returned {status}: {detail}");
            let refused = rejects_content(status) || status == StatusCode::NOT_FOUND;
            return Err(if single_message && refused {
                AppError::Rejected(msg)
            } else {
                AppError::Email(msg)
            });
        }
        Ok(response.json().await?)
    }

    async fn list_ids(&self, sender_address: &str) -> Result<Vec<String>> {
        let url = format!("{}/gmail/v1/users/me/messages", self.api_base);
        let filter = format!("from:{sender_address}");
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: ListResponse = {
                let mut query = vec![("q", filter.as_str())];
                if let Some(token) = page_token.as_deref() {
                    query.push(("pageToken", token));
                }
                self.get_json(&url, &query, false).await?
            };
            ids.extend(page.messages.into_iter().map(|m| m.id));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(count = ids.len(), "listed gmail messages");
        Ok(ids)
    }

    async fn fetch_message(&self, id: &str) -> Result<EmailMessage> {
        let url = format!("{}/gmail/v1/users/me/messages/{id}", self.api_base);
        let message: GmailMessage = self.get_json(&url, &[("format", "full")], true).await?;
        Ok(extract_email(&message))
    }
}

impl MailSource for GmailSource {
    fn list_messages_from_sender<'a>(
        &'a self,
        sender_address: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(self.list_ids(sender_address))
    }

    fn get_message<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<EmailMessage>> {
        Box::pin(self.fetch_message(id))
    }
}
