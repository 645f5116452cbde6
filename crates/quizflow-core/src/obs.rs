//! Structured observability hooks for workflow lifecycle events.
//!
//! Every event is an `info!`/`warn!` line carrying an `event` field, so JSON
//! output (`--json`) can be filtered on it. Workflow-scoped context comes
//! from [`workflow_span`], attached to command futures with `.instrument()`.

use tracing::{info, warn};

use quizflow_domain::{ResourceId, StageFailure, StageKind};

/// Span tagging everything a command does with its workflow id.
pub fn workflow_span(workflow_id: &str) -> tracing::Span {
    tracing::info_span!("quizflow.workflow", workflow_id = %workflow_id)
}

/// Emit event: state machine moved from one state to another.
pub fn emit_transition(from: &str, to: &str) {
    info!(event = "workflow.transition", from = %from, to = %to);
}

/// Emit event: a backend call was issued.
pub fn emit_stage_call(stage: StageKind, operation: &str) {
    info!(event = "stage.call", stage = %stage, operation = %operation);
}

/// Emit event: a stage produced a resource.
pub fn emit_resource_ready(stage: StageKind, id: &ResourceId) {
    info!(event = "stage.resource_ready", stage = %stage, resource_id = %id);
}

/// Emit event: a stage call failed (warning level).
pub fn emit_stage_failed(failure: &StageFailure) {
    warn!(
        event = "stage.failed",
        stage = %failure.stage,
        kind = %failure.kind,
        retryable = failure.is_retryable(),
        detail = %failure.detail,
    );
}

/// Emit event: the refinement controller branched.
pub fn emit_refinement_decision(refine: bool, problematic: usize, refinements: u32) {
    info!(
        event = "refinement.decision",
        decision = if refine { "refine" } else { "advance" },
        problematic_items = problematic,
        refinements = refinements,
    );
}

/// Emit event: an in-flight call was cancelled or its late result discarded.
pub fn emit_cancelled(stage: StageKind) {
    warn!(event = "stage.cancelled", stage = %stage);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_span_create() {
        let span = workflow_span("wf-1");
        let _entered = span.enter();
        emit_transition("idle", "generating");
    }
}
