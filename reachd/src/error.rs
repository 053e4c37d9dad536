//! Runtime error type.

use reachgrid::grid::{BeliefError, MapError};
use reachgrid::phase::PhaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReachError {
    #[error("malformed `{event}` payload: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("unusable map: {0}")]
    Map(#[from] MapError),

    #[error("belief update rejected: {0}")]
    Belief(#[from] BeliefError),

    #[error("trial phase: {0}")]
    Phase(#[from] PhaseError),

    #[error("`{0}` event stream closed")]
    StreamClosed(&'static str),

    #[error("reaching trial {0} already finished")]
    TrialFinished(usize),

    #[error("config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ReachError>;
