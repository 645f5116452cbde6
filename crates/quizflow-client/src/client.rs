//! Stage operation trait.

use async_trait::async_trait;

use quizflow_domain::{
    AnalysisRequest, DimensionalityResult, FittedModel, ModelFitRequest, ModelFitResult,
    ModelType, Quiz, QuizSpec, RefinementRequest, ResourceId, SimulationResponse, StageFailure,
};

/// Result type for stage operations
pub type ClientResult<T> = std::result::Result<T, StageFailure>;

/// One operation per pipeline stage.
///
/// Implementations hold no workflow state and do no caching. Only
/// `fetch_simulation` and `fetch_model_fit` are safe to repeat; the other
/// operations create a new server-side artifact on every call and are never
/// retried at this layer.
///
/// Every failure is a [`StageFailure`] attributed to the stage the operation
/// belongs to.
#[async_trait]
pub trait PipelineClient: Send + Sync {
    /// Generate a quiz for `spec`.
    async fn generate_quiz(&self, spec: &QuizSpec) -> ClientResult<Quiz>;

    /// Fetch the simulated responses for a quiz.
    async fn fetch_simulation(&self, quiz_id: &ResourceId) -> ClientResult<SimulationResponse>;

    /// Screen a simulation's response matrix for dimensionality.
    async fn start_dimensionality_analysis(
        &self,
        request: &AnalysisRequest,
    ) -> ClientResult<DimensionalityResult>;

    /// Rework the flagged items and re-screen.
    async fn refine_items(&self, request: &RefinementRequest)
        -> ClientResult<DimensionalityResult>;

    /// Fit a measurement model; returns the results identifier with the fit.
    async fn fit_model(&self, request: &ModelFitRequest) -> ClientResult<FittedModel>;

    /// Fetch an existing fit under a (possibly different) model type.
    async fn fetch_model_fit(
        &self,
        results_id: &ResourceId,
        model_type: ModelType,
    ) -> ClientResult<ModelFitResult>;
}
