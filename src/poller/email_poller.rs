//! Email inbox poller.
//!
//! The sender query has no cursor and is re-run in full each cycle, so
//! the ledger is the only guard against reprocessing. A message that
//! cannot be fetched or is refused by the model is skipped and picked up
//! again on the next cycle.

use std::sync::Arc;

use tracing::warn;

use crate::channels::email::sender_address;
use crate::channels::MailSource;
use crate::inference::{BoxFuture, PromptContext};
use crate::models::ledger::Ledger;
use crate::poller::{CycleReport, InboundMessage, Poller, PollerState, StateCell, TaskPipeline};
use crate::Result;

/// Poller over mail from one sender.
pub struct EmailPoller {
    source: Arc<dyn MailSource>,
    pipeline: Arc<TaskPipeline>,
    sender_address: String,
    state: StateCell,
}

impl EmailPoller {
    /// Create a poller for mail from `sender_address`.
    #[must_use]
    pub fn new(
        source: Arc<dyn MailSource>,
        pipeline: Arc<TaskPipeline>,
        sender_address: impl Into<String>,
    ) -> Self {
        Self {
            source,
            pipeline,
            sender_address: sender_address.into(),
            state: StateCell::default(),
        }
    }

    async fn cycle(&self) -> Result<CycleReport> {
        self.state.set(PollerState::Fetching);
        let ids = self
            .source
            .list_messages_from_sender(&self.sender_address)
            .await?;

        let mut report = CycleReport {
            fetched: ids.len(),
            ..CycleReport::default()
        };

        for id in &ids {
            match self.handle(id, &mut report).await {
                Ok(()) => {}
                Err(err) if err.is_message_scoped() => {
                    warn!(id = %id, %err, "message rejected; left for a later cycle");
                    report.rejected += 1;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(report)
    }

    async fn handle(&self, id: &str, report: &mut CycleReport) -> Result<()> {
        self.state.set(PollerState::Filtering);
        if self.pipeline.is_processed(Ledger::Email, id).await? {
            report.skipped += 1;
            return Ok(());
        }

        self.state.set(PollerState::Fetching);
        let email = self.source.get_message(id).await?;
        let owner = sender_address(&email.sender);

        let inbound = InboundMessage {
            ledger: Ledger::Email,
            key: id,
            owner: &owner,
            text: &email.body,
            context: PromptContext::Email {
                subject: email.subject.clone(),
                body: email.body.clone(),
            },
        };
        let disposition = self.pipeline.process(&inbound, &self.state).await?;
        report.record(&disposition);
        Ok(())
    }
}

impl Poller for EmailPoller {
    fn name(&self) -> &'static str {
        "email"
    }

    fn state(&self) -> &StateCell {
        &self.state
    }

    fn poll_once(&mut self) -> BoxFuture<'_, Result<CycleReport>> {
        Box::pin(self.cycle())
    }
}
