//! Per-message inference pipeline shared by both pollers.
//!
//! Order is fixed: prompt, inference, normalize, persist, mark processed.
//! A crash between persisting and marking yields a duplicate task on the
//! next cycle rather than a lost one.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::inference::{build_system_prompt, normalize, PromptContext, TaskInference};
use crate::models::ledger::Ledger;
use crate::models::task::Task;
use crate::persistence::ledger_repo::LedgerRepo;
use crate::persistence::task_repo::TaskRepo;
use crate::poller::{PollerState, StateCell};
use crate::{AppError, Result};

/// A candidate message ready for inference.
#[derive(Debug, Clone)]
pub struct InboundMessage<'a> {
    /// Ledger the key belongs to.
    pub ledger: Ledger,
    /// External dedup key (Slack `ts` or mail id).
    pub key: &'a str,
    /// Requester recorded as the task owner.
    pub owner: &'a str,
    /// Text sent as the user turn.
    pub text: &'a str,
    /// Channel-specific prompt material.
    pub context: PromptContext,
}

/// Outcome for a message whose inference call completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// A task was persisted and the message marked processed.
    Created(Task),
    /// The model found no task; the message was marked processed.
    NoTask,
    /// Output was empty or not task JSON; the message stays unmarked.
    Malformed,
}

/// Explicit dependencies for turning messages into tasks.
pub struct TaskPipeline {
    tasks: TaskRepo,
    ledger: LedgerRepo,
    inference: Arc<dyn TaskInference>,
    profile: Option<String>,
    inference_timeout: Duration,
}

impl TaskPipeline {
    /// Assemble a pipeline.
    #[must_use]
    pub fn new(
        tasks: TaskRepo,
        ledger: LedgerRepo,
        inference: Arc<dyn TaskInference>,
        profile: Option<String>,
        inference_timeout: Duration,
    ) -> Self {
        Self {
            tasks,
            ledger,
            inference,
            profile,
            inference_timeout,
        }
    }

    /// Whether `key` is already recorded in `ledger`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the lookup fails.
    pub async fn is_processed(&self, ledger: Ledger, key: &str) -> Result<bool> {
        self.ledger.is_processed(ledger, key).await
    }

    /// Infer, persist, and record one message.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Rejected` when the model refuses this message,
    /// `AppError::Timeout`, `AppError::Llm` or `AppError::Http` when
    /// inference otherwise fails, and `AppError::Db` when the task insert or
    /// ledger write fails. In every error case the message is left
    /// unmarked.
    pub async fn process(
        &self,
        message: &InboundMessage<'_>,
        state: &StateCell,
    ) -> Result<Disposition> {
        state.set(PollerState::Inferring);
        let system_prompt = build_system_prompt(self.profile.as_deref(), &message.context);
        let user_message = format!("Message: {}", message.text);

        let completion = tokio::time::timeout(
            self.inference_timeout,
            self.inference.complete(&system_prompt, &user_message),
        )
        .await
        .map_err(|_| {
            AppError::Timeout(format!(
                "inference exceeded {}s",
                self.inference_timeout.as_secs()
            ))
        })??;

        state.set(PollerState::Persisting);
        let Some(raw) = completion else {
            warn!(key = message.key, "model returned no content; message left for retry");
            return Ok(Disposition::Malformed);
        };

        let disposition = match normalize(&raw, message.owner, message.ledger.source()) {
            Err(err) => {
                warn!(
                    key = message.key,
                    %err,
                    raw = %raw,
                    "could not parse model output; message left for retry"
                );
                return Ok(Disposition::Malformed);
            }
            Ok(None) => Disposition::NoTask,
            Ok(Some(new_task)) => {
                let task = self.tasks.create(&new_task).await?;
                info!(
                    task_id = task.id,
                    title = %task.title,
                    source = message.ledger.source().as_str(),
                    "task saved"
                );
                Disposition::Created(task)
            }
        };

        state.set(PollerState::MarkingProcessed);
        if !self.ledger.mark_processed(message.ledger, message.key).await? {
            warn!(key = message.key, "message was already marked processed");
        }
        Ok(disposition)
    }
}
