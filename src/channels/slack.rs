//! Slack channel history reader.

use std::sync::Arc;

use slack_morphism::prelude::{
    SlackApiConversationsHistoryRequest, SlackApiToken, SlackApiTokenType, SlackApiTokenValue,
    SlackChannelId, SlackClient, SlackClientHyperHttpsConnector, SlackCursorId,
    SlackHistoryMessage, SlackTs,
};
use tracing::debug;

use crate::config::SlackConfig;
use crate::inference::BoxFuture;
use crate::{AppError, Result};

/// A chat message as seen by the Slack poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Message timestamp; doubles as the dedup key.
    pub ts: String,
    /// Message text.
    pub text: String,
    /// Author's user id, when the sender is a user.
    pub user: Option<String>,
}

impl From<&SlackHistoryMessage> for ChatMessage {
    fn from(msg: &SlackHistoryMessage) -> Self {
        Self {
            ts: msg.origin.ts.0.clone(),
            text: msg.content.text.clone().unwrap_or_default(),
            user: msg.sender.user.as_ref().map(|u| u.0.clone()),
        }
    }
}

/// Read access to a chat channel keyed by a timestamp cursor.
pub trait ChatSource: Send + Sync {
    /// List every message in `channel_id` newer than `watermark`.
    ///
    /// No ordering is guaranteed; callers sort by timestamp.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` when the API call fails.
    fn list_messages_since<'a>(
        &'a self,
        channel_id: &'a str,
        watermark: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ChatMessage>>>;
}

/// [`ChatSource`] backed by `conversations.history`.
pub struct SlackHistorySource {
    client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    bot_token: SlackApiToken,
    page_size: u16,
}

impl SlackHistorySource {
    /// Build a history reader from Slack settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the HTTPS connector cannot be created.
    pub fn new(config: &SlackConfig) -> Result<Self> {
        let connector = SlackClientHyperHttpsConnector::new()
            .map_err(|err| AppError::Slack(format!("failed to init slack connector: {err}")))?;
        let bot_token = SlackApiToken {
            token_value: SlackApiTokenValue(config.bot_token.clone()),
            cookie: None,
            team_id: None,
            scope: None,
            token_type: Some(SlackApiTokenType::Bot),
        };

        Ok(Self {
            client: Arc::new(SlackClient::new(connector)),
            bot_token,
            page_size: config.history_page_size,
        })
    }

    async fn fetch_since(&self, channel_id: &str, watermark: &str) -> Result<Vec<ChatMessage>> {
        let session = self.client.open_session(&self.bot_token);
        let mut cursor: Option<SlackCursorId> = None;
        let mut messages = Vec::new();

        loop {
            let request = SlackApiConversationsHistoryRequest {
                channel: Some(SlackChannelId(channel_id.to_owned())),
                cursor: cursor.take(),
                latest: None,
                limit: Some(self.page_size),
                oldest: Some(SlackTs(watermark.to_owned())),
                inclusive: None,
                include_all_metadata: None,
            };

            let response = session
                .conversations_history(&request)
                .await
                .map_err(|err| AppError::Slack(format!("failed to read history: {err}")))?;

            messages.extend(response.messages.iter().map(ChatMessage::from));

            cursor = response
                .response_metadata
                .and_then(|meta| meta.next_cursor)
                .filter(|next| !next.0.is_empty());
            if cursor.is_none() {
                break;
            }
            debug!(fetched = messages.len(), "following history cursor");
        }

        Ok(messages)
    }
}

impl ChatSource for SlackHistorySource {
    fn list_messages_since<'a>(
        &'a self,
        channel_id: &'a str,
        watermark: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ChatMessage>>> {
        Box::pin(self.fetch_since(channel_id, watermark))
    }
}
