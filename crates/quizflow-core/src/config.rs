//! Orchestrator settings: per-stage deadlines and branch policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use quizflow_domain::{AnalysisMethod, ModelType, StageKind};

use crate::refinement::RefinementPolicy;

/// Deadline for calls that return quickly (quiz generation, simulation).
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for the statistical stages (dimensionality, model fit).
pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(120);

/// Per-stage call deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimeouts {
    pub quiz: Duration,
    pub simulation: Duration,
    pub analysis: Duration,
    pub results: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            quiz: DEFAULT_STAGE_TIMEOUT,
            simulation: DEFAULT_STAGE_TIMEOUT,
            analysis: DEFAULT_ANALYSIS_TIMEOUT,
            results: DEFAULT_ANALYSIS_TIMEOUT,
        }
    }
}

impl StageTimeouts {
    /// Same deadline for every stage.
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            quiz: timeout,
            simulation: timeout,
            analysis: timeout,
            results: timeout,
        }
    }

    pub fn for_stage(&self, stage: StageKind) -> Duration {
        match stage {
            StageKind::Quiz => self.quiz,
            StageKind::Simulation => self.simulation,
            StageKind::Analysis => self.analysis,
            StageKind::Results => self.results,
        }
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub timeouts: StageTimeouts,
    pub refinement: RefinementPolicy,
    /// When false, a REFINE decision parks the workflow until
    /// `request_refinement` is called.
    pub auto_refine: bool,
    pub analysis_method: AnalysisMethod,
    /// Model requested by the initial fit.
    pub default_model: ModelType,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            timeouts: StageTimeouts::default(),
            refinement: RefinementPolicy::default(),
            auto_refine: true,
            analysis_method: AnalysisMethod::default(),
            default_model: ModelType::DEFAULT,
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_max_refinements(mut self, max_refinements: u32) -> Self {
        self.refinement = RefinementPolicy { max_refinements };
        self
    }

    pub fn with_auto_refine(mut self, auto_refine: bool) -> Self {
        self.auto_refine = auto_refine;
        self
    }

    pub fn with_analysis_method(mut self, method: AnalysisMethod) -> Self {
        self.analysis_method = method;
        self
    }

    pub fn with_default_model(mut self, model: ModelType) -> Self {
        self.default_model = model;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert!(config.auto_refine);
        assert_eq!(config.refinement.max_refinements, 3);
        assert_eq!(config.analysis_method, AnalysisMethod::Efa);
        assert_eq!(config.default_model, ModelType::Rasch);
        assert_eq!(config.timeouts.for_stage(StageKind::Quiz), Duration::from_secs(30));
        assert_eq!(
            config.timeouts.for_stage(StageKind::Analysis),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_builders() {
        let config = OrchestratorConfig::new()
            .with_timeouts(StageTimeouts::uniform(Duration::from_secs(2)))
            .with_max_refinements(1)
            .with_auto_refine(false)
            .with_analysis_method(AnalysisMethod::Noharm)
            .with_default_model(ModelType::TwoPl);

        assert_eq!(config.timeouts.for_stage(StageKind::Results), Duration::from_secs(2));
        assert_eq!(config.refinement.max_refinements, 1);
        assert!(!config.auto_refine);
        assert_eq!(config.analysis_method, AnalysisMethod::Noharm);
        assert_eq!(config.default_model, ModelType::TwoPl);
    }
}
