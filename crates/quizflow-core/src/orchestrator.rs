//! Pipeline orchestrator: the quiz → simulation → analysis → results state
//! machine.
//!
//! Commands take `&self` and may be issued from any task through an `Arc`.
//! One command at a time owns the workflow; a second command issued while a
//! backend call is pending is rejected with
//! [`PipelineError::TransitionInFlight`]. `snapshot`, `cancel` and `restart`
//! never wait on the backend and are always available.
//!
//! Session state sits behind a `std::sync::Mutex` that is only taken in
//! synchronous sections. Every backend call races a `CancellationToken` and
//! runs under the per-stage deadline from [`StageTimeouts`]. A completion
//! whose epoch no longer matches the session is discarded.
//!
//! [`StageTimeouts`]: crate::config::StageTimeouts

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};
use uuid::Uuid;

use quizflow_client::{ClientResult, PipelineClient};
use quizflow_domain::{
    AnalysisRequest, DimensionalityResult, FittedModel, ModelFitRequest, ModelFitResult,
    ModelType, Quiz, QuizSpec, RefinementRequest, ResourceChain, ResourceId,
    SimulationResponse, StageFailure, StageKind, StageResource,
};

use crate::config::OrchestratorConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::obs;
use crate::refinement::{RefinementController, RefinementDecision};
use crate::state::{WorkflowSnapshot, WorkflowState};

/// One backend call, carrying exactly what it needs to be re-issued.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StageCall {
    GenerateQuiz(QuizSpec),
    FetchSimulation(ResourceId),
    StartAnalysis(AnalysisRequest),
    RefineItems(RefinementRequest),
    FitModel(ModelFitRequest),
    FetchModelFit(ResourceId, ModelType),
}

impl StageCall {
    fn stage(&self) -> StageKind {
        match self {
            StageCall::GenerateQuiz(_) => StageKind::Quiz,
            StageCall::FetchSimulation(_) => StageKind::Simulation,
            StageCall::StartAnalysis(_) | StageCall::RefineItems(_) => StageKind::Analysis,
            StageCall::FitModel(_) | StageCall::FetchModelFit(..) => StageKind::Results,
        }
    }

    fn operation(&self) -> &'static str {
        match self {
            StageCall::GenerateQuiz(_) => "generate_quiz",
            StageCall::FetchSimulation(_) => "fetch_simulation",
            StageCall::StartAnalysis(_) => "start_dimensionality_analysis",
            StageCall::RefineItems(_) => "refine_items",
            StageCall::FitModel(_) => "fit_model",
            StageCall::FetchModelFit(..) => "fetch_model_fit",
        }
    }
}

enum StageResponse {
    Quiz(Quiz),
    Simulation(SimulationResponse),
    Analysis(DimensionalityResult),
    Refined(DimensionalityResult),
    Fitted(FittedModel),
    ModelFit(ModelFitResult),
}

struct InFlight {
    call: StageCall,
    token: CancellationToken,
}

struct Session {
    workflow_id: Uuid,
    /// Bumped whenever outstanding results must be ignored.
    epoch: u64,
    state: WorkflowState,
    resources: ResourceChain,
    quiz: Option<Quiz>,
    simulation: Option<SimulationResponse>,
    dimensionality: Option<DimensionalityResult>,
    model_fit: Option<ModelFitResult>,
    selected_model: Option<ModelType>,
    refinements: u32,
    last_error: Option<StageFailure>,
    /// Call to re-issue on `retry`.
    pending: Option<StageCall>,
    in_flight: Option<InFlight>,
    awaiting_refinement: bool,
}

impl Session {
    fn new(epoch: u64) -> Self {
        Self {
            workflow_id: Uuid::new_v4(),
            epoch,
            state: WorkflowState::Idle,
            resources: ResourceChain::new(),
            quiz: None,
            simulation: None,
            dimensionality: None,
            model_fit: None,
            selected_model: None,
            refinements: 0,
            last_error: None,
            pending: None,
            in_flight: None,
            awaiting_refinement: false,
        }
    }

    fn transition(&mut self, to: WorkflowState) {
        if self.state != to {
            obs::emit_transition(self.state.as_str(), to.as_str());
            self.state = to;
        }
    }

    fn store(&mut self, stage: StageKind, id: ResourceId) {
        obs::emit_resource_ready(stage, &id);
        self.resources.insert(StageResource::ready(stage, id));
    }

    fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            workflow_id: self.workflow_id,
            state: self.state,
            current: self.resources.current().cloned(),
            resources: self.resources.clone(),
            quiz: self.quiz.clone(),
            simulation: self.simulation.clone(),
            dimensionality: self.dimensionality.clone(),
            model_fit: self.model_fit.clone(),
            selected_model: self.selected_model,
            refinements: self.refinements,
            last_error: self.last_error.clone(),
            in_flight: self.in_flight.as_ref().map(|f| f.call.stage()),
            retry_available: self.pending.is_some(),
            awaiting_refinement: self.awaiting_refinement,
        }
    }
}

/// Drives one workflow at a time against a [`PipelineClient`].
pub struct PipelineOrchestrator {
    client: Arc<dyn PipelineClient>,
    config: OrchestratorConfig,
    controller: RefinementController,
    session: Mutex<Session>,
    /// Held for the whole of a command.
    gate: tokio::sync::Mutex<()>,
}

impl PipelineOrchestrator {
    pub fn new(client: Arc<dyn PipelineClient>, config: OrchestratorConfig) -> Self {
        let controller = RefinementController::new(config.refinement);
        Self {
            client,
            config,
            controller,
            session: Mutex::new(Session::new(0)),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.session().snapshot()
    }

    /// Validate `spec` and drive a new workflow until it settles.
    ///
    /// Settles at `Complete`, `Failed`, a retryable stall (`Err(Stage)` with
    /// the state left at the stalled stage) or, when `auto_refine` is off, at
    /// `AnalyzingDimensionality` awaiting [`request_refinement`].
    ///
    /// [`request_refinement`]: PipelineOrchestrator::request_refinement
    pub async fn submit_quiz_spec(&self, spec: QuizSpec) -> PipelineResult<WorkflowSnapshot> {
        spec.validate()?;
        let _gate = self.acquire()?;

        let span = {
            let mut session = self.session();
            if session.state != WorkflowState::Idle {
                return Err(invalid("submit_quiz_spec", session.state));
            }
            session.transition(WorkflowState::Generating);
            obs::workflow_span(&session.workflow_id.to_string())
        };

        self.drive(StageCall::GenerateQuiz(spec))
            .instrument(span)
            .await
    }

    /// Run one refinement cycle on a workflow parked by manual refinement
    /// mode, then keep driving.
    pub async fn request_refinement(&self) -> PipelineResult<WorkflowSnapshot> {
        let _gate = self.acquire()?;

        let (call, span) = {
            let mut session = self.session();
            if session.state != WorkflowState::AnalyzingDimensionality
                || !session.awaiting_refinement
            {
                return Err(invalid("request_refinement", session.state));
            }
            let span = obs::workflow_span(&session.workflow_id.to_string());
            match self.branch(&mut session, true) {
                Ok(Some(call)) => (call, span),
                Ok(None) => return Ok(session.snapshot()),
                Err(failure) => {
                    return Err(self.record_failure(&mut session, None, failure));
                }
            }
        };

        self.drive(call).instrument(span).await
    }

    /// Re-fetch the fit for `model` on a completed workflow.
    ///
    /// Only the model fit is replaced. A failure leaves the workflow
    /// `Complete` with its previous results.
    pub async fn select_model(&self, model: ModelType) -> PipelineResult<WorkflowSnapshot> {
        let _gate = self.acquire()?;

        let (call, span) = {
            let session = self.session();
            let results_id = match (session.state, session.resources.id(StageKind::Results)) {
                (WorkflowState::Complete, Some(id)) => id.clone(),
                (state, _) => return Err(invalid("select_model", state)),
            };
            (
                StageCall::FetchModelFit(results_id, model),
                obs::workflow_span(&session.workflow_id.to_string()),
            )
        };

        self.drive(call).instrument(span).await
    }

    /// Re-issue the call that stalled on a retryable failure or was
    /// cancelled. Resources from earlier stages are kept.
    pub async fn retry(&self) -> PipelineResult<WorkflowSnapshot> {
        let _gate = self.acquire()?;

        let (call, span) = {
            let mut session = self.session();
            let call = session.pending.take().ok_or(PipelineError::NothingToRetry)?;
            session.last_error = None;
            (call, obs::workflow_span(&session.workflow_id.to_string()))
        };

        debug!(operation = call.operation(), "Retrying stage call");
        self.drive(call).instrument(span).await
    }

    /// Abort the in-flight call, if any. Returns the stage that was cancelled.
    ///
    /// No resource is recorded for that stage and a late result is ignored.
    /// Quiz generation rolls back to `Idle`; any other cancelled call stays
    /// available to [`retry`](PipelineOrchestrator::retry).
    pub fn cancel(&self) -> Option<StageKind> {
        let mut session = self.session();
        let in_flight = session.in_flight.take()?;
        in_flight.token.cancel();
        session.epoch += 1;

        let stage = in_flight.call.stage();
        match in_flight.call {
            StageCall::GenerateQuiz(_) => session.transition(WorkflowState::Idle),
            StageCall::FetchModelFit(..) => {}
            call => session.pending = Some(call),
        }
        obs::emit_cancelled(stage);
        Some(stage)
    }

    /// Discard the workflow and return to `Idle` under a new workflow id.
    pub fn restart(&self) {
        let mut session = self.session();
        if let Some(in_flight) = session.in_flight.take() {
            in_flight.token.cancel();
            obs::emit_cancelled(in_flight.call.stage());
        }
        let epoch = session.epoch + 1;
        obs::emit_transition(session.state.as_str(), WorkflowState::Idle.as_str());
        *session = Session::new(epoch);
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self) -> PipelineResult<tokio::sync::MutexGuard<'_, ()>> {
        self.gate
            .try_lock()
            .map_err(|_| PipelineError::TransitionInFlight)
    }

    async fn drive(&self, mut call: StageCall) -> PipelineResult<WorkflowSnapshot> {
        loop {
            match self.execute(call).await? {
                Some(next) => call = next,
                None => return Ok(self.snapshot()),
            }
        }
    }

    /// Issue one call, apply its outcome and return the follow-up call.
    async fn execute(&self, call: StageCall) -> PipelineResult<Option<StageCall>> {
        let stage = call.stage();
        let token = CancellationToken::new();
        let epoch = {
            let mut session = self.session();
            session.awaiting_refinement = false;
            // a new call supersedes whatever was stalled
            session.pending = None;
            session.in_flight = Some(InFlight {
                call: call.clone(),
                token: token.clone(),
            });
            session.epoch
        };

        obs::emit_stage_call(stage, call.operation());
        let outcome = tokio::select! {
            _ = token.cancelled() => None,
            result = self.invoke(&call) => Some(result),
        };

        let mut session = self.session();
        let result = match outcome {
            Some(result) if session.epoch == epoch => result,
            _ => {
                debug!(stage = %stage, "Discarding result of cancelled call");
                return Err(PipelineError::Cancelled { stage });
            }
        };
        session.in_flight = None;

        let applied = result.and_then(|response| self.apply(&mut session, &call, response));
        match applied {
            Ok(next) => {
                session.last_error = None;
                Ok(next)
            }
            Err(failure) => Err(self.record_failure(&mut session, Some(call), failure)),
        }
    }

    async fn invoke(&self, call: &StageCall) -> ClientResult<StageResponse> {
        let stage = call.stage();
        let limit = self.config.timeouts.for_stage(stage);
        match tokio::time::timeout(limit, self.dispatch(call)).await {
            Ok(result) => result,
            Err(_) => Err(StageFailure::timeout(
                stage,
                format!("no response within {}s", limit.as_secs_f64()),
            )),
        }
    }

    async fn dispatch(&self, call: &StageCall) -> ClientResult<StageResponse> {
        let client = self.client.as_ref();
        Ok(match call {
            StageCall::GenerateQuiz(spec) => StageResponse::Quiz(client.generate_quiz(spec).await?),
            StageCall::FetchSimulation(quiz_id) => {
                StageResponse::Simulation(client.fetch_simulation(quiz_id).await?)
            }
            StageCall::StartAnalysis(request) => {
                StageResponse::Analysis(client.start_dimensionality_analysis(request).await?)
            }
            StageCall::RefineItems(request) => {
                StageResponse::Refined(client.refine_items(request).await?)
            }
            StageCall::FitModel(request) => StageResponse::Fitted(client.fit_model(request).await?),
            StageCall::FetchModelFit(results_id, model) => {
                StageResponse::ModelFit(client.fetch_model_fit(results_id, *model).await?)
            }
        })
    }

    /// Validate a response against the call that produced it and advance.
    fn apply(
        &self,
        session: &mut Session,
        call: &StageCall,
        response: StageResponse,
    ) -> ClientResult<Option<StageCall>> {
        match (call, response) {
            (StageCall::GenerateQuiz(_), StageResponse::Quiz(quiz)) => {
                quiz.validate()
                    .map_err(|e| StageFailure::contract(StageKind::Quiz, e))?;
                let quiz_id = quiz.id.clone();
                session.store(StageKind::Quiz, quiz_id.clone());
                session.quiz = Some(quiz);
                session.transition(WorkflowState::Simulating);
                Ok(Some(StageCall::FetchSimulation(quiz_id)))
            }
            (StageCall::FetchSimulation(quiz_id), StageResponse::Simulation(simulation)) => {
                simulation
                    .validate(quiz_id)
                    .map_err(|e| StageFailure::contract(StageKind::Simulation, e))?;
                let simulation_id = simulation.simulation_id();
                session.store(StageKind::Simulation, simulation_id.clone());
                session.simulation = Some(simulation);
                session.transition(WorkflowState::AnalyzingDimensionality);
                Ok(Some(StageCall::StartAnalysis(AnalysisRequest::new(
                    simulation_id,
                    self.config.analysis_method,
                ))))
            }
            (StageCall::StartAnalysis(request), StageResponse::Analysis(result)) => {
                result
                    .validate()
                    .map_err(|e| StageFailure::contract(StageKind::Analysis, e))?;
                let analysis_id = result
                    .id
                    .clone()
                    .unwrap_or_else(|| request.simulation_id.clone());
                session.store(StageKind::Analysis, analysis_id);
                session.dimensionality = Some(result);
                self.branch(session, false)
            }
            (StageCall::RefineItems(_), StageResponse::Refined(result)) => {
                result
                    .validate()
                    .map_err(|e| StageFailure::contract(StageKind::Analysis, e))?;
                session.refinements += 1;
                if let Some(id) = result.id.clone() {
                    session.store(StageKind::Analysis, id);
                }
                session.dimensionality = Some(result);
                session.transition(WorkflowState::AnalyzingDimensionality);
                self.branch(session, false)
            }
            (StageCall::FitModel(request), StageResponse::Fitted(fitted)) => {
                fitted
                    .result
                    .validate(request.model_type)
                    .map_err(|e| StageFailure::contract(StageKind::Results, e))?;
                session.store(StageKind::Results, fitted.id);
                session.model_fit = Some(fitted.result);
                session.selected_model = Some(request.model_type);
                session.transition(WorkflowState::Complete);
                Ok(None)
            }
            (StageCall::FetchModelFit(_, model), StageResponse::ModelFit(result)) => {
                result
                    .validate(*model)
                    .map_err(|e| StageFailure::contract(StageKind::Results, e))?;
                session.model_fit = Some(result);
                session.selected_model = Some(*model);
                Ok(None)
            }
            // dispatch answers every call with its own response variant
            (call, _) => Err(StageFailure::server(
                call.stage(),
                format!("mismatched response for {}", call.operation()),
            )),
        }
    }

    /// Branch on the current dimensionality result.
    ///
    /// With `refine_now` unset and auto refinement off, a REFINE decision
    /// parks the workflow instead of issuing the call.
    fn branch(&self, session: &mut Session, refine_now: bool) -> ClientResult<Option<StageCall>> {
        let simulation_id = session
            .resources
            .id(StageKind::Simulation)
            .cloned()
            .ok_or_else(|| StageFailure::server(StageKind::Analysis, "no simulation resource"))?;
        let result = session
            .dimensionality
            .as_ref()
            .ok_or_else(|| StageFailure::server(StageKind::Analysis, "no dimensionality result"))?;

        let decision = self
            .controller
            .decide(&simulation_id, result, session.refinements);
        let problematic = result.problematic_items.len();

        match decision? {
            RefinementDecision::Advance => {
                obs::emit_refinement_decision(false, problematic, session.refinements);
                session.transition(WorkflowState::FittingModel);
                Ok(Some(StageCall::FitModel(
                    ModelFitRequest::new(simulation_id).with_model(self.config.default_model),
                )))
            }
            RefinementDecision::Refine(request) => {
                obs::emit_refinement_decision(true, problematic, session.refinements);
                if refine_now || self.config.auto_refine {
                    session.awaiting_refinement = false;
                    session.transition(WorkflowState::Refining);
                    Ok(Some(StageCall::RefineItems(request)))
                } else {
                    session.awaiting_refinement = true;
                    Ok(None)
                }
            }
        }
    }

    /// Record `failure` and settle the state it leaves the workflow in.
    ///
    /// Retryable failures keep the state and remember `call` for `retry`.
    /// Model-switch failures never leave `Complete`.
    fn record_failure(
        &self,
        session: &mut Session,
        call: Option<StageCall>,
        failure: StageFailure,
    ) -> PipelineError {
        obs::emit_stage_failed(&failure);
        session.last_error = Some(failure.clone());

        let model_switch = matches!(call, Some(StageCall::FetchModelFit(..)));
        if failure.is_retryable() {
            session.pending = call;
        } else {
            session.pending = None;
            if !model_switch {
                session.awaiting_refinement = false;
                session.transition(WorkflowState::Failed {
                    stage: failure.stage,
                    kind: failure.kind,
                });
            }
        }
        PipelineError::Stage(failure)
    }
}

fn invalid(command: &'static str, state: WorkflowState) -> PipelineError {
    PipelineError::InvalidCommand {
        command,
        state: state.as_str(),
    }
}
