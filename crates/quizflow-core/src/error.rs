//! Orchestrator command errors.

use thiserror::Error;

use quizflow_domain::{StageFailure, StageKind, ValidationError};

/// Why an orchestrator command did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The quiz spec was rejected before any remote call.
    #[error("invalid quiz spec: {0}")]
    Validation(#[from] ValidationError),

    /// A backend call failed; see `StageFailure::is_retryable`.
    #[error(transparent)]
    Stage(#[from] StageFailure),

    /// Another command is still waiting on the backend.
    #[error("another transition is already in flight")]
    TransitionInFlight,

    /// The command does not apply in the current state.
    #[error("cannot {command} while {state}")]
    InvalidCommand {
        command: &'static str,
        state: &'static str,
    },

    /// The in-flight call was cancelled; its result (if any) was discarded.
    #[error("{stage} call cancelled")]
    Cancelled { stage: StageKind },

    #[error("no stalled call to retry")]
    NothingToRetry,
}

impl PipelineError {
    /// The stage failure behind this error, if any.
    pub fn stage_failure(&self) -> Option<&StageFailure> {
        match self {
            PipelineError::Stage(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Result type for orchestrator commands
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
