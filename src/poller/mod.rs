//! Channel pollers and the loop that drives them.
//!
//! Each poller runs forever on its own task: one cycle in flight at a
//! time, a fixed sleep between cycles, and a separate backoff after a
//! failed cycle. The cancellation token is checked before every cycle
//! and while sleeping. No error ends the loop.

pub mod email_poller;
pub mod pipeline;
pub mod slack_poller;
pub mod watermark;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::config::PollSchedule;
use crate::inference::BoxFuture;
use crate::Result;

pub use email_poller::EmailPoller;
pub use pipeline::{Disposition, InboundMessage, TaskPipeline};
pub use slack_poller::SlackPoller;
pub use watermark::Watermark;

/// Where a poller currently is within its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Sleeping between cycles.
    Idle,
    /// Listing candidate messages from the channel.
    Fetching,
    /// Checking a candidate against the dedup ledger.
    Filtering,
    /// Waiting on the language model.
    Inferring,
    /// Normalizing output and writing the task.
    Persisting,
    /// Appending the message key to the ledger.
    MarkingProcessed,
    /// The last cycle failed; backing off.
    Error,
}

/// Shared, observable state cell for one poller.
#[derive(Debug)]
pub struct StateCell {
    tx: watch::Sender<PollerState>,
}

impl Default for StateCell {
    fn default() -> Self {
        Self {
            tx: watch::Sender::new(PollerState::Idle),
        }
    }
}

impl StateCell {
    /// Record a transition.
    pub fn set(&self, state: PollerState) {
        let previous = self.tx.send_replace(state);
        if previous != state {
            debug!(?previous, ?state, "poller state");
        }
    }

    /// Current state.
    #[must_use]
    pub fn get(&self) -> PollerState {
        *self.tx.borrow()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PollerState> {
        self.tx.subscribe()
    }
}

/// Counters from one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Candidates returned by the channel (plus carried-over retries).
    pub fetched: usize,
    /// Candidates already present in the ledger.
    pub skipped: usize,
    /// Tasks persisted.
    pub created: usize,
    /// Messages the model judged to contain no task.
    pub no_task: usize,
    /// Messages left retry-eligible because of malformed output.
    pub malformed: usize,
    /// Messages refused by the mailbox or the model; left unmarked.
    pub rejected: usize,
}

impl CycleReport {
    fn record(&mut self, disposition: &Disposition) {
        match disposition {
            Disposition::Created(_) => self.created += 1,
            Disposition::NoTask => self.no_task += 1,
            Disposition::Malformed => self.malformed += 1,
        }
    }

    fn has_activity(&self) -> bool {
        self.created + self.no_task + self.malformed + self.rejected > 0
    }
}

/// One channel's fetch/infer/persist cycle.
pub trait Poller: Send {
    /// Short channel name used in logs.
    fn name(&self) -> &'static str;

    /// Observable state of this poller.
    fn state(&self) -> &StateCell;

    /// Run a single cycle.
    ///
    /// # Errors
    ///
    /// Returns the first channel-wide transport or storage error;
    /// messages not yet marked processed stay eligible for the next cycle.
    /// Errors scoped to one message are counted in
    /// [`CycleReport::rejected`] and do not end the cycle.
    fn poll_once(&mut self) -> BoxFuture<'_, Result<CycleReport>>;
}

/// Drive `poller` until `cancel` fires.
pub async fn run_poller<P: Poller>(
    mut poller: P,
    schedule: PollSchedule,
    cancel: CancellationToken,
) {
    let name = poller.name();
    info!(
        poller = name,
        interval = ?schedule.interval,
        backoff = ?schedule.error_backoff,
        "poller started"
    );

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let span = info_span!("poll_cycle", poller = name);
        let delay = match poller.poll_once().instrument(span).await {
            Ok(report) => {
                poller.state().set(PollerState::Idle);
                if report.has_activity() {
                    info!(
                        poller = name,
                        fetched = report.fetched,
                        skipped = report.skipped,
                        created = report.created,
                        no_task = report.no_task,
                        malformed = report.malformed,
                        rejected = report.rejected,
                        "poll cycle complete"
                    );
                } else {
                    debug!(poller = name, fetched = report.fetched, "poll cycle idle");
                }
                schedule.interval
            }
            Err(err) => {
                poller.state().set(PollerState::Error);
                error!(poller = name, %err, "poll cycle failed");
                schedule.error_backoff
            }
        };

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
        poller.state().set(PollerState::Idle);
    }

    info!(poller = name, "poller shutting down");
}

/// Spawn [`run_poller`] on the runtime.
#[must_use]
pub fn spawn_poller<P: Poller + 'static>(
    poller: P,
    schedule: PollSchedule,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_poller(poller, schedule, cancel))
}
