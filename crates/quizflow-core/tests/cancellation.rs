use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use quizflow_client::fakes::{Operation, ScriptedPipelineClient};
use quizflow_core::{OrchestratorConfig, PipelineError, PipelineOrchestrator, WorkflowState};
use quizflow_domain::{
    AnalysisMethod, DimensionalityResult, FittedModel, ModelFitResult, ModelType, Quiz, QuizSpec,
    ResourceId, SimulationResponse, StageKind, SummaryStatistics,
};

fn simulation(quiz_id: &str) -> SimulationResponse {
    SimulationResponse {
        id: None,
        quiz_id: ResourceId::new(quiz_id),
        responses: Vec::new(),
        summary_statistics: SummaryStatistics::default(),
    }
}

fn unidimensional() -> DimensionalityResult {
    DimensionalityResult {
        id: None,
        method: AnalysisMethod::Efa,
        is_unidimensional: true,
        factor_loadings: BTreeMap::from([("item_1".to_string(), 0.7)]),
        problematic_items: Vec::new(),
        fit_statistics: BTreeMap::new(),
    }
}

fn rasch_fit(id: &str) -> FittedModel {
    FittedModel {
        id: ResourceId::new(id),
        result: ModelFitResult {
            model_type: ModelType::Rasch,
            item_parameters: BTreeMap::from([("item_1".to_string(), vec![0.1])]),
            model_fit_statistics: BTreeMap::new(),
            item_fit_statistics: BTreeMap::new(),
            test_information: None,
        },
    }
}

fn scripted() -> Arc<ScriptedPipelineClient> {
    let client = Arc::new(ScriptedPipelineClient::new());
    client
        .push_quiz(Ok(Quiz::with_id("Q1")))
        .push_simulation(Ok(simulation("Q1")))
        .push_analysis(Ok(unidimensional()))
        .push_fit(Ok(rasch_fit("R1")));
    client
}

async fn wait_for_in_flight(orch: &PipelineOrchestrator, stage: StageKind) {
    while orch.snapshot().in_flight != Some(stage) {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_mid_simulation_leaves_no_simulation_resource() {
    let client = scripted();
    client.set_latency(Operation::FetchSimulation, Duration::from_secs(30));
    let orch = Arc::new(PipelineOrchestrator::new(
        client.clone(),
        OrchestratorConfig::default(),
    ));

    let task = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.submit_quiz_spec(QuizSpec::new("fractions")).await })
    };
    wait_for_in_flight(&orch, StageKind::Simulation).await;

    assert_eq!(orch.cancel(), Some(StageKind::Simulation));
    let err = task.await.expect("join").unwrap_err();
    assert_eq!(
        err,
        PipelineError::Cancelled {
            stage: StageKind::Simulation
        }
    );

    let snapshot = orch.snapshot();
    assert!(snapshot.resources.simulation.is_none());
    assert!(snapshot.simulation.is_none());
    assert_eq!(snapshot.resources.id(StageKind::Quiz), Some(&ResourceId::new("Q1")));
    assert_eq!(snapshot.state, WorkflowState::Simulating);
    assert_eq!(snapshot.in_flight, None);
    assert!(snapshot.retry_available);

    // The cancelled call is resumable.
    client.set_latency(Operation::FetchSimulation, Duration::ZERO);
    let done = orch.retry().await.expect("retry");
    assert_eq!(done.state, WorkflowState::Complete);
    assert_eq!(client.count(Operation::FetchSimulation), 2);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_generation_returns_to_idle() {
    let client = scripted();
    client.set_latency(Operation::GenerateQuiz, Duration::from_secs(30));
    let orch = Arc::new(PipelineOrchestrator::new(
        client.clone(),
        OrchestratorConfig::default(),
    ));

    let task = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.submit_quiz_spec(QuizSpec::new("fractions")).await })
    };
    wait_for_in_flight(&orch, StageKind::Quiz).await;

    assert_eq!(orch.cancel(), Some(StageKind::Quiz));
    assert!(matches!(
        task.await.expect("join"),
        Err(PipelineError::Cancelled {
            stage: StageKind::Quiz
        })
    ));

    let snapshot = orch.snapshot();
    assert_eq!(snapshot.state, WorkflowState::Idle);
    assert!(snapshot.resources.is_empty());
    assert!(!snapshot.retry_available);

    // A fresh submission is accepted.
    client.set_latency(Operation::GenerateQuiz, Duration::ZERO);
    let done = orch
        .submit_quiz_spec(QuizSpec::new("fractions"))
        .await
        .expect("workflow");
    assert_eq!(done.state, WorkflowState::Complete);
}

#[tokio::test(start_paused = true)]
async fn restart_discards_late_results() {
    let client = scripted();
    client.set_latency(Operation::StartAnalysis, Duration::from_secs(30));
    let orch = Arc::new(PipelineOrchestrator::new(
        client.clone(),
        OrchestratorConfig::default(),
    ));
    let first_id = orch.snapshot().workflow_id;

    let task = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.submit_quiz_spec(QuizSpec::new("fractions")).await })
    };
    wait_for_in_flight(&orch, StageKind::Analysis).await;

    orch.restart();
    let err = task.await.expect("join").unwrap_err();
    assert_eq!(
        err,
        PipelineError::Cancelled {
            stage: StageKind::Analysis
        }
    );

    let snapshot = orch.snapshot();
    assert_eq!(snapshot.state, WorkflowState::Idle);
    assert_ne!(snapshot.workflow_id, first_id);
    assert!(snapshot.resources.is_empty());
    assert!(snapshot.dimensionality.is_none());
    assert_eq!(client.count(Operation::FitModel), 0);
}

#[tokio::test(start_paused = true)]
async fn commands_are_rejected_while_a_transition_is_in_flight() {
    let client = scripted();
    client.set_latency(Operation::FetchSimulation, Duration::from_secs(5));
    let orch = Arc::new(PipelineOrchestrator::new(
        client.clone(),
        OrchestratorConfig::default(),
    ));

    let task = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.submit_quiz_spec(QuizSpec::new("fractions")).await })
    };
    wait_for_in_flight(&orch, StageKind::Simulation).await;

    assert_eq!(
        orch.submit_quiz_spec(QuizSpec::new("decimals"))
            .await
            .unwrap_err(),
        PipelineError::TransitionInFlight
    );
    assert_eq!(
        orch.select_model(ModelType::TwoPl).await.unwrap_err(),
        PipelineError::TransitionInFlight
    );
    assert_eq!(orch.retry().await.unwrap_err(), PipelineError::TransitionInFlight);
    assert_eq!(
        orch.request_refinement().await.unwrap_err(),
        PipelineError::TransitionInFlight
    );

    // Reads stay available.
    assert_eq!(orch.snapshot().state, WorkflowState::Simulating);

    let done = task.await.expect("join").expect("workflow");
    assert_eq!(done.state, WorkflowState::Complete);
    assert_eq!(client.count(Operation::GenerateQuiz), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_model_switch_stays_complete() {
    let client = scripted();
    client
        .push_fetched_fit(Ok(ModelFitResult {
            model_type: ModelType::TwoPl,
            item_parameters: BTreeMap::from([("item_1".to_string(), vec![1.0, 0.1])]),
            model_fit_statistics: BTreeMap::new(),
            item_fit_statistics: BTreeMap::new(),
            test_information: None,
        }))
        .set_latency(Operation::FetchModelFit, Duration::from_secs(30));
    let orch = Arc::new(PipelineOrchestrator::new(
        client.clone(),
        OrchestratorConfig::default(),
    ));
    let before = orch
        .submit_quiz_spec(QuizSpec::new("fractions"))
        .await
        .expect("workflow");

    let task = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.select_model(ModelType::TwoPl).await })
    };
    wait_for_in_flight(&orch, StageKind::Results).await;

    assert_eq!(orch.cancel(), Some(StageKind::Results));
    assert!(task.await.expect("join").is_err());

    let snapshot = orch.snapshot();
    assert_eq!(snapshot.state, WorkflowState::Complete);
    assert_eq!(snapshot.model_fit, before.model_fit);
    assert_eq!(snapshot.selected_model, Some(ModelType::Rasch));
}
