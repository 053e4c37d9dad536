//! Session driver.
//!
//! Runs the [`TrialSequencer`] against real timers: each `Wait` becomes a
//! `tokio::time::sleep`, each `BeginReaching` runs one [`ReachingTrial`] to
//! completion. The sequencer decides, this loop only executes.
//!
//! Move reports from every trial go through one [`Reporter`]; the session does
//! not return until the last queued report has been answered.

use reachgrid::phase::{Phase, PhaseCommand, PhaseTimings, TrialSequencer};
use reachgrid::render::Surface;
use reachgrid::stats::{TrialRecord, TrialRecords};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::controller::{ReachingTrial, TrialContext};
use crate::error::Result;
use crate::service::Reporter;

/// Progress notifications for observers of a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    FixationStarted { trial_index: usize },
    ReachingStarted { trial_index: usize },
    ReachingFinished { trial_index: usize, duration_ms: u64 },
    FeedbackStarted { trial_index: usize, duration_ms: u64 },
    TrialRecorded(TrialRecord),
    /// Every trial is recorded and every move report answered.
    SessionComplete,
}

pub struct Session<'a> {
    ctx: TrialContext,
    surface: &'a mut dyn Surface,
    total_trials: usize,
    timings: PhaseTimings,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl<'a> Session<'a> {
    pub fn new(
        ctx: TrialContext,
        surface: &'a mut dyn Surface,
        total_trials: usize,
        timings: PhaseTimings,
    ) -> Self {
        Self {
            ctx,
            surface,
            total_trials,
            timings,
            events: None,
        }
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    fn notify(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Run every trial and return the completion records.
    pub async fn run(&mut self) -> Result<TrialRecords> {
        let mut seq = TrialSequencer::new(self.total_trials, self.timings);
        let reporter = Reporter::spawn(self.ctx.service.clone());
        let (numbers_tx, mut numbers) = watch::channel(0usize);

        info!("Session started: {} trials", self.total_trials);
        let mut command = seq.start()?;
        loop {
            command = match command {
                PhaseCommand::Wait(delay) => {
                    match seq.phase() {
                        Phase::Fixation => {
                            info!("Trial {}: fixation", seq.trial_index());
                            self.notify(SessionEvent::FixationStarted {
                                trial_index: seq.trial_index(),
                            });
                        }
                        Phase::Feedback { duration_ms } => {
                            info!("Trial completed in {} milliseconds.", duration_ms);
                            self.notify(SessionEvent::FeedbackStarted {
                                trial_index: seq.trial_index(),
                                duration_ms,
                            });
                        }
                        other => debug!("Waiting {:?} in {}", delay, other),
                    }
                    tokio::time::sleep(delay).await;

                    let recorded = seq.records().len();
                    let next = seq.timer_elapsed()?;
                    if seq.records().len() > recorded {
                        if let Some(record) = seq.last_record().copied() {
                            self.notify(SessionEvent::TrialRecorded(record));
                        }
                    }
                    next
                }
                PhaseCommand::BeginReaching { trial_index } => {
                    info!("Trial {}: reaching", trial_index);
                    self.notify(SessionEvent::ReachingStarted { trial_index });
                    numbers_tx.send_replace(trial_index);

                    let outcome = ReachingTrial::new(&self.ctx, reporter.queue(), &mut *self.surface)
                        .run(&mut numbers)
                        .await?;
                    debug!(
                        "Trial {}: {} accepted, {} rejected moves",
                        trial_index, outcome.accepted_moves, outcome.rejected_moves
                    );
                    self.notify(SessionEvent::ReachingFinished {
                        trial_index,
                        duration_ms: outcome.duration_ms,
                    });
                    seq.reaching_finished(outcome.duration_ms)?
                }
                PhaseCommand::SessionComplete => {
                    let delivered = reporter.drain().await;
                    debug!("{} move reports delivered", delivered);
                    info!(
                        "Session complete: {} trials, {} ms total",
                        seq.records().len(),
                        seq.records().total_ms()
                    );
                    self.notify(SessionEvent::SessionComplete);
                    break;
                }
            };
        }
        Ok(seq.into_records())
    }
}
