//! Trial phase sequencing: Fixation → Reaching → Feedback, once per trial.
//!
//! [`TrialSequencer`] holds the rules only. It never sleeps or reads a clock;
//! it answers each event with the next [`PhaseCommand`] and the runtime carries
//! it out (arm a timer, start a reaching trial, or hand the session back).

use core::fmt;
use core::time::Duration;

use thiserror::Error;

use crate::stats::{RecordError, TrialRecord, TrialRecords};

pub const DEFAULT_FIXATION: Duration = Duration::from_millis(2000);
pub const DEFAULT_FEEDBACK: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fixation,
    Reaching,
    Feedback { duration_ms: u64 },
    Complete,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Fixation => "fixation",
            Phase::Reaching => "reaching",
            Phase::Feedback { .. } => "feedback",
            Phase::Complete => "complete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimings {
    pub fixation: Duration,
    pub feedback: Duration,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            fixation: DEFAULT_FIXATION,
            feedback: DEFAULT_FEEDBACK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseCommand {
    /// Arm the phase timer; report expiry with [`TrialSequencer::timer_elapsed`].
    Wait(Duration),
    /// Run the reaching trial; report completion with
    /// [`TrialSequencer::reaching_finished`].
    BeginReaching { trial_index: usize },
    /// All trials are recorded.
    SessionComplete,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseError {
    #[error("`{event}` is not valid during the {phase} phase")]
    UnexpectedEvent { event: &'static str, phase: Phase },
    #[error(transparent)]
    Record(#[from] RecordError),
}

#[derive(Debug, Clone)]
pub struct TrialSequencer {
    total_trials: usize,
    trial_index: usize,
    phase: Phase,
    timings: PhaseTimings,
    records: TrialRecords,
}

impl TrialSequencer {
    pub fn new(total_trials: usize, timings: PhaseTimings) -> Self {
        let total_trials = total_trials.max(1);
        Self {
            total_trials,
            trial_index: 0,
            phase: Phase::Idle,
            timings,
            records: TrialRecords::with_capacity(total_trials),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn trial_index(&self) -> usize {
        self.trial_index
    }

    pub fn total_trials(&self) -> usize {
        self.total_trials
    }

    pub fn records(&self) -> &TrialRecords {
        &self.records
    }

    pub fn into_records(self) -> TrialRecords {
        self.records
    }


    pub fn start(&mut self) -> Result<PhaseCommand, PhaseError> {
        if self.phase != Phase::Idle {
            return Err(self.unexpected("start"));
        }
        Ok(self.enter_fixation())
    }

    /// The timer armed by the last [`PhaseCommand::Wait`] fired.
    pub fn timer_elapsed(&mut self) -> Result<PhaseCommand, PhaseError> {
        match self.phase {
            Phase::Fixation => {
                self.phase = Phase::Reaching;
                Ok(PhaseCommand::BeginReaching {
                    trial_index: self.trial_index,
                })
            }
            Phase::Feedback { duration_ms } => {
                self.records.record(self.trial_index, duration_ms)?;
                if self.trial_index + 1 < self.total_trials {
                    self.trial_index += 1;
                    Ok(self.enter_fixation())
                } else {
                    self.phase = Phase::Complete;
                    Ok(PhaseCommand::SessionComplete)
                }
            }
            _ => Err(self.unexpected("timer_elapsed")),
        }
    }

    /// The reaching trial signalled completion with its own measured duration.
    pub fn reaching_finished(&mut self, duration_ms: u64) -> Result<PhaseCommand, PhaseError> {
        if self.phase != Phase::Reaching {
            return Err(self.unexpected("reaching_finished"));
        }
        self.phase = Phase::Feedback { duration_ms };
        Ok(PhaseCommand::Wait(self.timings.feedback))
    }

    pub fn last_record(&self) -> Option<&TrialRecord> {
        self.records.as_slice().last()
    }

    fn enter_fixation(&mut self) -> PhaseCommand {
        self.phase = Phase::Fixation;
        PhaseCommand::Wait(self.timings.fixation)
    }

    fn unexpected(&self, event: &'static str) -> PhaseError {
        PhaseError::UnexpectedEvent {
            event,
            phase: self.phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_trial_walks_all_phases() {
        let mut s = TrialSequencer::new(1, PhaseTimings::default());
        assert_eq!(s.start(), Ok(PhaseCommand::Wait(Duration::from_millis(2000))));
        assert_eq!(s.phase(), Phase::Fixation);

        assert_eq!(
            s.timer_elapsed(),
            Ok(PhaseCommand::BeginReaching { trial_index: 0 })
        );

        assert_eq!(
            s.reaching_finished(1500),
            Ok(PhaseCommand::Wait(Duration::from_millis(1000)))
        );
        assert_eq!(s.phase(), Phase::Feedback { duration_ms: 1500 });
        assert!(s.records().is_empty(), "record is written after feedback");

        assert_eq!(s.timer_elapsed(), Ok(PhaseCommand::SessionComplete));
        assert_eq!(
            s.last_record(),
            Some(&TrialRecord {
                index: 0,
                duration_ms: 1500
            })
        );
        assert_eq!(s.phase(), Phase::Complete);
    }

    #[test]
    fn cycles_until_total_trials() {
        let mut s = TrialSequencer::new(3, PhaseTimings::default());
        s.start().unwrap();
        let mut completed = false;
        for i in 0..3 {
            assert_eq!(
                s.timer_elapsed(),
                Ok(PhaseCommand::BeginReaching { trial_index: i })
            );
            s.reaching_finished(100 * (i as u64 + 1)).unwrap();
            match s.timer_elapsed().unwrap() {
                PhaseCommand::Wait(d) => {
                    assert_eq!(d, DEFAULT_FIXATION);
                    assert!(i < 2);
                }
                PhaseCommand::SessionComplete => {
                    assert_eq!(i, 2);
                    completed = true;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(completed);
        let durations: Vec<u64> = s.records().as_slice().iter().map(|r| r.duration_ms).collect();
        assert_eq!(durations, [100, 200, 300]);
    }

    #[test]
    fn out_of_phase_events_are_rejected() {
        let mut s = TrialSequencer::new(2, PhaseTimings::default());
        assert!(matches!(
            s.timer_elapsed(),
            Err(PhaseError::UnexpectedEvent { phase: Phase::Idle, .. })
        ));
        s.start().unwrap();
        assert!(matches!(
            s.reaching_finished(10),
            Err(PhaseError::UnexpectedEvent {
                phase: Phase::Fixation,
                ..
            })
        ));
        assert!(s.start().is_err());
        s.timer_elapsed().unwrap();
        assert!(matches!(
            s.timer_elapsed(),
            Err(PhaseError::UnexpectedEvent {
                phase: Phase::Reaching,
                ..
            })
        ));
    }
}
