use dealflow_core::{LedgerError, SourceError};
use dealflow_shared::RawOffer;
use serde::Serialize;
use std::fmt;

/// Orchestrator lifecycle within one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleState {
    Idle,
    Fetching,
    Normalizing,
    Deciding,
    Dispatching,
    Recording,
}

impl CycleState {
    /// Successor on the happy path. `Recording` returns to `Idle`.
    pub fn next(self) -> Self {
        match self {
            CycleState::Idle => CycleState::Fetching,
            CycleState::Fetching => CycleState::Normalizing,
            CycleState::Normalizing => CycleState::Deciding,
            CycleState::Deciding => CycleState::Dispatching,
            CycleState::Dispatching => CycleState::Recording,
            CycleState::Recording => CycleState::Idle,
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Idle => "IDLE",
            CycleState::Fetching => "FETCHING",
            CycleState::Normalizing => "NORMALIZING",
            CycleState::Deciding => "DECIDING",
            CycleState::Dispatching => "DISPATCHING",
            CycleState::Recording => "RECORDING",
        };
        f.write_str(name)
    }
}

/// Result of fetching one source, after retries.
#[derive(Debug)]
pub struct SourceOutcome {
    pub source_id: String,
    pub attempts: u32,
    pub result: Result<Vec<RawOffer>, SourceError>,
}

/// Errors that abort the current cycle. Everything else is tallied in the record.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("cycle aborted: {0}")]
    LedgerUnavailable(#[from] LedgerError),
}
