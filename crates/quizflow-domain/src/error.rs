//! Error taxonomy for the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resource::StageKind;

/// Malformed user input, caught before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("knowledge point must not be empty")]
    EmptyKnowledgePoint,

    #[error("num_items must be between {min} and {max}, got {actual}")]
    ItemCountOutOfRange { actual: u32, min: u32, max: u32 },
}

/// Why a stage call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transport-level failure (connection refused, reset, DNS).
    NetworkError,

    /// The caller-supplied deadline expired.
    Timeout,

    /// The backend answered with a non-success status.
    ServerError,

    /// The backend answered, but the payload breaks a data-model invariant.
    ContractViolation,

    /// The refinement loop hit its configured bound.
    RefinementLimitExceeded,
}

impl FailureKind {
    /// Whether the same call may be re-issued without discarding prior stages.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::NetworkError | FailureKind::Timeout)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NetworkError => "network_error",
            FailureKind::Timeout => "timeout",
            FailureKind::ServerError => "server_error",
            FailureKind::ContractViolation => "contract_violation",
            FailureKind::RefinementLimitExceeded => "refinement_limit_exceeded",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed stage call, attributed to exactly one stage.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{stage} stage failed ({kind}): {detail}")]
pub struct StageFailure {
    pub stage: StageKind,
    pub kind: FailureKind,
    pub detail: String,
}

impl StageFailure {
    pub fn new(stage: StageKind, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            detail: detail.into(),
        }
    }

    pub fn network(stage: StageKind, detail: impl Into<String>) -> Self {
        Self::new(stage, FailureKind::NetworkError, detail)
    }

    pub fn timeout(stage: StageKind, detail: impl Into<String>) -> Self {
        Self::new(stage, FailureKind::Timeout, detail)
    }

    pub fn server(stage: StageKind, detail: impl Into<String>) -> Self {
        Self::new(stage, FailureKind::ServerError, detail)
    }

    /// Attribute a contract violation to `stage`.
    pub fn contract(stage: StageKind, err: ContractError) -> Self {
        Self::new(stage, FailureKind::ContractViolation, err.0)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// A backend payload that breaks a data-model invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("contract violation: {0}")]
pub struct ContractError(pub String);

impl ContractError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }
}
