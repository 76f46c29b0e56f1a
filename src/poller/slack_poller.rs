//! Slack channel poller.
//!
//! History is fetched with `oldest` set to the watermark, which advances
//! to the newest timestamp seen regardless of per-message outcome.
//! Messages left behind the watermark (malformed output, a rejected
//! message or an aborted cycle) are carried in an in-memory retry list. After a restart the
//! watermark starts at zero and the ledger filters the full history.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::channels::{ChatMessage, ChatSource};
use crate::inference::{BoxFuture, PromptContext};
use crate::models::ledger::Ledger;
use crate::poller::watermark::{ts_key, Watermark};
use crate::poller::{
    CycleReport, Disposition, InboundMessage, Poller, PollerState, StateCell, TaskPipeline,
};
use crate::Result;

const UNKNOWN_USER: &str = "unknown_user";

/// Poller over one Slack channel.
pub struct SlackPoller {
    source: Arc<dyn ChatSource>,
    pipeline: Arc<TaskPipeline>,
    channel_id: String,
    watermark: Watermark,
    retry: Vec<ChatMessage>,
    state: StateCell,
}

impl SlackPoller {
    /// Create a poller starting from watermark `0`.
    #[must_use]
    pub fn new(
        source: Arc<dyn ChatSource>,
        pipeline: Arc<TaskPipeline>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            source,
            pipeline,
            channel_id: channel_id.into(),
            watermark: Watermark::default(),
            retry: Vec::new(),
            state: StateCell::default(),
        }
    }

    /// Current watermark.
    #[must_use]
    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }

    /// Messages carried over for retry in the next cycle.
    #[must_use]
    pub fn pending_retries(&self) -> &[ChatMessage] {
        &self.retry
    }

    async fn cycle(&mut self) -> Result<CycleReport> {
        self.state.set(PollerState::Fetching);
        let fetched = self
            .source
            .list_messages_since(&self.channel_id, self.watermark.as_str())
            .await?;

        for message in &fetched {
            self.watermark.advance(&message.ts);
        }

        let mut batch = std::mem::take(&mut self.retry);
        batch.extend(fetched);
        let mut seen = HashSet::new();
        batch.retain(|m| seen.insert(m.ts.clone()));
        batch.sort_by_key(|m| ts_key(&m.ts));

        let mut report = CycleReport {
            fetched: batch.len(),
            ..CycleReport::default()
        };

        let mut pending = batch.into_iter();
        while let Some(message) = pending.next() {
            match self.handle(&message, &mut report).await {
                Ok(true) => {}
                Ok(false) => self.retry.push(message),
                Err(err) if err.is_message_scoped() => {
                    warn!(ts = %message.ts, %err, "message rejected; kept for retry");
                    report.rejected += 1;
                    self.retry.push(message);
                }
                Err(err) => {
                    self.retry.push(message);
                    self.retry.extend(pending);
                    return Err(err);
                }
            }
        }

        debug!(watermark = self.watermark.as_str(), retries = self.retry.len(), "slack cycle done");
        Ok(report)
    }

    /// Returns `false` when the message must be retried.
    async fn handle(&self, message: &ChatMessage, report: &mut CycleReport) -> Result<bool> {
        self.state.set(PollerState::Filtering);
        if self.pipeline.is_processed(Ledger::Slack, &message.ts).await? {
            report.skipped += 1;
            return Ok(true);
        }

        let inbound = InboundMessage {
            ledger: Ledger::Slack,
            key: &message.ts,
            owner: message.user.as_deref().unwrap_or(UNKNOWN_USER),
            text: &message.text,
            context: PromptContext::Chat,
        };
        let disposition = self.pipeline.process(&inbound, &self.state).await?;
        report.record(&disposition);
        Ok(disposition != Disposition::Malformed)
    }
}

impl Poller for SlackPoller {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn state(&self) -> &StateCell {
        &self.state
    }

    fn poll_once(&mut self) -> BoxFuture<'_, Result<CycleReport>> {
        Box::pin(self.cycle())
    }
}
