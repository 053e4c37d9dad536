//! Per-trial completion records and the session summary.

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrialRecord {
    pub index: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("trial {index} recorded out of order (next expected index is {expected})")]
    OutOfOrder { index: usize, expected: usize },
}

/// Completion times for the trials of one session.
///
/// Records are append-only: trial `i` must be the `i`-th record, and once
/// written it is never touched again.
#[derive(Debug, Clone, Default)]
pub struct TrialRecords {
    records: Vec<TrialRecord>,
}

impl TrialRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(trials: usize) -> Self {
        Self {
            records: Vec::with_capacity(trials),
        }
    }

    pub fn record(&mut self, index: usize, duration_ms: u64) -> Result<&TrialRecord, RecordError> {
        let expected = self.records.len();
        if index != expected {
            return Err(RecordError::OutOfOrder { index, expected });
        }
        self.records.push(TrialRecord { index, duration_ms });
        Ok(&self.records[expected])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn as_slice(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&TrialRecord> {
        self.records.get(index)
    }

    pub fn total_ms(&self) -> u64 {
        self.records.iter().map(|r| r.duration_ms).sum()
    }

    pub fn mean_ms(&self) -> Option<f64> {
        if self.records.is_empty() {
            return None;
        }
        Some(self.total_ms() as f64 / self.records.len() as f64)
    }

    pub fn fastest(&self) -> Option<&TrialRecord> {
        self.records.iter().min_by_key(|r| r.duration_ms)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            trials: self.records.clone(),
            total_ms: self.total_ms(),
            mean_ms: self.mean_ms(),
            fastest_ms: self.fastest().map(|r| r.duration_ms),
        }
    }
}

/// Aggregate view printed at the end of a session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SessionSummary {
    pub trials: Vec<TrialRecord>,
    pub total_ms: u64,
    pub mean_ms: Option<f64>,
    pub fastest_ms: Option<u64>,
}
