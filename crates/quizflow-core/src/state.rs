//! Workflow states and the read model handed to presentation layers.

use serde::Serialize;
use uuid::Uuid;

use quizflow_domain::{
    DimensionalityResult, FailureKind, ModelFitResult, ModelType, Quiz, ResourceChain,
    SimulationResponse, StageFailure, StageKind, StageResource,
};

/// Where the workflow is.
///
/// An in-progress tag names the stage being worked on, whether its call is
/// in flight or stalled on a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Generating,
    Simulating,
    AnalyzingDimensionality,
    Refining,
    FittingModel,
    Complete,
    Failed { stage: StageKind, kind: FailureKind },
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Generating => "generating",
            WorkflowState::Simulating => "simulating",
            WorkflowState::AnalyzingDimensionality => "analyzing_dimensionality",
            WorkflowState::Refining => "refining",
            WorkflowState::FittingModel => "fitting_model",
            WorkflowState::Complete => "complete",
            WorkflowState::Failed { .. } => "failed",
        }
    }

    /// Stage worked on in this state, if any.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            WorkflowState::Generating => Some(StageKind::Quiz),
            WorkflowState::Simulating => Some(StageKind::Simulation),
            WorkflowState::AnalyzingDimensionality | WorkflowState::Refining => {
                Some(StageKind::Analysis)
            }
            WorkflowState::FittingModel | WorkflowState::Complete => Some(StageKind::Results),
            WorkflowState::Failed { stage, .. } => Some(*stage),
            WorkflowState::Idle => None,
        }
    }

    /// Only `restart` leaves these.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Complete | WorkflowState::Failed { .. })
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowState::Failed { stage, kind } => write!(f, "failed ({stage}: {kind})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Point-in-time copy of a workflow session.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSnapshot {
    pub workflow_id: Uuid,
    #[serde(flatten)]
    pub state: WorkflowState,
    /// Most advanced resource produced so far.
    pub current: Option<StageResource>,
    pub resources: ResourceChain,
    pub quiz: Option<Quiz>,
    pub simulation: Option<SimulationResponse>,
    pub dimensionality: Option<DimensionalityResult>,
    pub model_fit: Option<ModelFitResult>,
    pub selected_model: Option<ModelType>,
    /// Refine calls completed in this workflow.
    pub refinements: u32,
    pub last_error: Option<StageFailure>,
    pub in_flight: Option<StageKind>,
    pub retry_available: bool,
    pub awaiting_refinement: bool,
}
