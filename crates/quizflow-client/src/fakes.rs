//! In-memory fakes for the client trait (testing only)
//!
//! Provides `ScriptedPipelineClient`, which answers each operation from a
//! FIFO script and records every call it receives.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use quizflow_domain::{
    AnalysisRequest, DimensionalityResult, FittedModel, ModelFitRequest, ModelFitResult,
    ModelType, Quiz, QuizSpec, RefinementRequest, ResourceId, SimulationResponse, StageFailure,
    StageKind,
};

use crate::client::{ClientResult, PipelineClient};

/// Client operations, used to key scripts and latencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GenerateQuiz,
    FetchSimulation,
    StartAnalysis,
    RefineItems,
    FitModel,
    FetchModelFit,
}

impl Operation {
    fn stage(&self) -> StageKind {
        match self {
            Operation::GenerateQuiz => StageKind::Quiz,
            Operation::FetchSimulation => StageKind::Simulation,
            Operation::StartAnalysis | Operation::RefineItems => StageKind::Analysis,
            Operation::FitModel | Operation::FetchModelFit => StageKind::Results,
        }
    }
}

/// A call as received by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    GenerateQuiz(QuizSpec),
    FetchSimulation(ResourceId),
    StartAnalysis(AnalysisRequest),
    RefineItems(RefinementRequest),
    FitModel(ModelFitRequest),
    FetchModelFit(ResourceId, ModelType),
}

impl RecordedCall {
    pub fn operation(&self) -> Operation {
        match self {
            RecordedCall::GenerateQuiz(_) => Operation::GenerateQuiz,
            RecordedCall::FetchSimulation(_) => Operation::FetchSimulation,
            RecordedCall::StartAnalysis(_) => Operation::StartAnalysis,
            RecordedCall::RefineItems(_) => Operation::RefineItems,
            RecordedCall::FitModel(_) => Operation::FitModel,
            RecordedCall::FetchModelFit(..) => Operation::FetchModelFit,
        }
    }
}

#[derive(Debug, Default)]
struct Scripts {
    quizzes: VecDeque<ClientResult<Quiz>>,
    simulations: VecDeque<ClientResult<SimulationResponse>>,
    analyses: VecDeque<ClientResult<DimensionalityResult>>,
    refinements: VecDeque<ClientResult<DimensionalityResult>>,
    fits: VecDeque<ClientResult<FittedModel>>,
    fetched_fits: VecDeque<ClientResult<ModelFitResult>>,
}

/// Scripted in-memory [`PipelineClient`].
///
/// An operation whose script is empty fails with a `ServerError`, so a test
/// that drives further than it scripted fails loudly.
#[derive(Debug, Default)]
pub struct ScriptedPipelineClient {
    scripts: Mutex<Scripts>,
    latency: Mutex<HashMap<Operation, Duration>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedPipelineClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_quiz(&self, response: ClientResult<Quiz>) -> &Self {
        self.scripts.lock().unwrap().quizzes.push_back(response);
        self
    }

    pub fn push_simulation(&self, response: ClientResult<SimulationResponse>) -> &Self {
        self.scripts.lock().unwrap().simulations.push_back(response);
        self
    }

    pub fn push_analysis(&self, response: ClientResult<DimensionalityResult>) -> &Self {
        self.scripts.lock().unwrap().analyses.push_back(response);
        self
    }

    pub fn push_refinement(&self, response: ClientResult<DimensionalityResult>) -> &Self {
        self.scripts.lock().unwrap().refinements.push_back(response);
        self
    }

    pub fn push_fit(&self, response: ClientResult<FittedModel>) -> &Self {
        self.scripts.lock().unwrap().fits.push_back(response);
        self
    }

    pub fn push_fetched_fit(&self, response: ClientResult<ModelFitResult>) -> &Self {
        self.scripts.lock().unwrap().fetched_fits.push_back(response);
        self
    }

    /// Delay every call to `op` by `delay` before answering.
    pub fn set_latency(&self, op: Operation, delay: Duration) -> &Self {
        self.latency.lock().unwrap().insert(op, delay);
        self
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls received for `op`.
    pub fn count(&self, op: Operation) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation() == op)
            .count()
    }

    async fn answer<T>(
        &self,
        call: RecordedCall,
        pick: impl FnOnce(&mut Scripts) -> Option<ClientResult<T>>,
    ) -> ClientResult<T> {
        let op = call.operation();
        self.calls.lock().unwrap().push(call);

        let delay = self.latency.lock().unwrap().get(&op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let next = pick(&mut self.scripts.lock().unwrap());
        next.unwrap_or_else(|| {
            Err(StageFailure::server(
                op.stage(),
                format!("no scripted response for {op:?}"),
            ))
        })
    }
}

#[async_trait]
impl PipelineClient for ScriptedPipelineClient {
    async fn generate_quiz(&self, spec: &QuizSpec) -> ClientResult<Quiz> {
        self.answer(RecordedCall::GenerateQuiz(spec.clone()), |s| {
            s.quizzes.pop_front()
        })
        .await
    }

    async fn fetch_simulation(&self, quiz_id: &ResourceId) -> ClientResult<SimulationResponse> {
        self.answer(RecordedCall::FetchSimulation(quiz_id.clone()), |s| {
            s.simulations.pop_front()
        })
        .await
    }

    async fn start_dimensionality_analysis(
        &self,
        request: &AnalysisRequest,
    ) -> ClientResult<DimensionalityResult> {
        self.answer(RecordedCall::StartAnalysis(request.clone()), |s| {
            s.analyses.pop_front()
        })
        .await
    }

    async fn refine_items(
        &self,
        request: &RefinementRequest,
    ) -> ClientResult<DimensionalityResult> {
        self.answer(RecordedCall::RefineItems(request.clone()), |s| {
            s.refinements.pop_front()
        })
        .await
    }

    async fn fit_model(&self, request: &ModelFitRequest) -> ClientResult<FittedModel> {
        self.answer(RecordedCall::FitModel(request.clone()), |s| s.fits.pop_front())
            .await
    }

    async fn fetch_model_fit(
        &self,
        results_id: &ResourceId,
        model_type: ModelType,
    ) -> ClientResult<ModelFitResult> {
        self.answer(
            RecordedCall::FetchModelFit(results_id.clone(), model_type),
            |s| s.fetched_fits.pop_front(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let client = ScriptedPipelineClient::new();
        client
            .push_quiz(Ok(Quiz::with_id("Q1")))
            .push_quiz(Ok(Quiz::with_id("Q2")));

        let spec = QuizSpec::new("fractions");
        assert_eq!(client.generate_quiz(&spec).await.unwrap().id.as_str(), "Q1");
        assert_eq!(client.generate_quiz(&spec).await.unwrap().id.as_str(), "Q2");
        assert_eq!(client.count(Operation::GenerateQuiz), 2);
    }

    #[tokio::test]
    async fn test_unscripted_call_fails_loudly() {
        let client = ScriptedPipelineClient::new();
        let err = client
            .fetch_simulation(&ResourceId::new("Q1"))
            .await
            .unwrap_err();
        assert_eq!(err.stage, StageKind::Simulation);
        assert_eq!(
            client.calls(),
            vec![RecordedCall::FetchSimulation(ResourceId::new("Q1"))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_applied() {
        let client = ScriptedPipelineClient::new();
        client
            .push_quiz(Ok(Quiz::with_id("Q1")))
            .set_latency(Operation::GenerateQuiz, Duration::from_secs(5));

        let start = tokio::time::Instant::now();
        client.generate_quiz(&QuizSpec::new("x")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
