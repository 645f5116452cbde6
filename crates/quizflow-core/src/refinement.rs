//! Branch policy after a dimensionality result arrives.
//!
//! Unidimensional → advance to model fitting. Otherwise → refine the flagged
//! items and re-screen, at most `max_refinements` times per workflow.

use serde::{Deserialize, Serialize};

use quizflow_domain::{
    ContractError, DimensionalityResult, FailureKind, RefinementRequest, ResourceId,
    StageFailure, StageKind,
};

/// Bounded refinement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementPolicy {
    /// Maximum refine calls issued per workflow.
    pub max_refinements: u32,
}

impl Default for RefinementPolicy {
    fn default() -> Self {
        Self { max_refinements: 3 }
    }
}

/// What the orchestrator does next with a dimensionality result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefinementDecision {
    /// Proceed to model fitting.
    Advance,
    /// Issue exactly this refinement and re-screen.
    Refine(RefinementRequest),
}

#[derive(Debug, Clone, Default)]
pub struct RefinementController {
    policy: RefinementPolicy,
}

impl RefinementController {
    pub fn new(policy: RefinementPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RefinementPolicy {
        self.policy
    }

    /// Decide the next action for `result`.
    ///
    /// `refinements_issued` counts the refine calls already completed in this
    /// workflow. Fails with `ContractViolation` when the result contradicts
    /// itself (not unidimensional yet nothing flagged, or flagged items with
    /// no loading) and with `RefinementLimitExceeded` when another
    /// refinement would exceed the policy.
    pub fn decide(
        &self,
        simulation_id: &ResourceId,
        result: &DimensionalityResult,
        refinements_issued: u32,
    ) -> Result<RefinementDecision, StageFailure> {
        result
            .validate()
            .map_err(|e| StageFailure::contract(StageKind::Analysis, e))?;

        if result.is_unidimensional {
            return Ok(RefinementDecision::Advance);
        }

        if result.problematic_items.is_empty() {
            return Err(StageFailure::contract(
                StageKind::Analysis,
                ContractError::new(
                    "result is not unidimensional but flags no problematic items",
                ),
            ));
        }

        if refinements_issued >= self.policy.max_refinements {
            return Err(StageFailure::new(
                StageKind::Analysis,
                FailureKind::RefinementLimitExceeded,
                format!(
                    "still not unidimensional after {} refinement(s); limit is {}",
                    refinements_issued, self.policy.max_refinements
                ),
            ));
        }

        Ok(RefinementDecision::Refine(RefinementRequest {
            simulation_id: simulation_id.clone(),
            problematic_items: result.problematic_items.clone(),
        }))
    }
}
