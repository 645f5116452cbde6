//! HTTP adapter for the statistics backend.
//!
//! Endpoints live under `/api` on the configured base URL. Path segments are
//! percent-encoded; identifiers are otherwise passed through untouched.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use quizflow_domain::{
    AnalysisRequest, DimensionalityResult, FittedModel, ModelFitRequest, ModelFitResult,
    ModelType, Quiz, QuizSpec, RefinementRequest, ResourceId, SimulationResponse, StageFailure,
    StageKind,
};

use crate::client::{ClientResult, PipelineClient};
use crate::config::ClientConfig;
use crate::error::ClientError;

/// Longest error body echoed into a failure detail.
const MAX_ERROR_BODY: usize = 512;

/// reqwest-backed [`PipelineClient`]
#[derive(Debug, Clone)]
pub struct HttpPipelineClient {
    base_url: Url,
    http_client: reqwest::Client,
}

impl HttpPipelineClient {
    /// Create a new client for the backend in `config`
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(config.base_url));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()?;

        Ok(HttpPipelineClient {
            base_url,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env())
    }

    /// Fetch a previously generated quiz.
    pub async fn fetch_quiz(&self, quiz_id: &ResourceId) -> ClientResult<Quiz> {
        let url = self.endpoint(&["api", "quiz", "quiz", quiz_id.as_str()]);
        self.send(StageKind::Quiz, self.http_client.get(url)).await
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base URLs are rejected in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(
        &self,
        stage: StageKind,
        request: RequestBuilder,
    ) -> ClientResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_failure(stage, e))?;

        let status = response.status();
        debug!(stage = %stage, status = status.as_u16(), url = %response.url(), "Backend responded");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(stage = %stage, status = status.as_u16(), "Backend returned error status");
            return Err(StageFailure::server(
                stage,
                format!("HTTP {}: {}", status.as_u16(), truncate(&body)),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_failure(stage, e))?;

        serde_json::from_slice(&bytes).map_err(|e| {
            StageFailure::new(
                stage,
                quizflow_domain::FailureKind::ContractViolation,
                format!("malformed {stage} response: {e}"),
            )
        })
    }
}

#[async_trait]
impl PipelineClient for HttpPipelineClient {
    async fn generate_quiz(&self, spec: &QuizSpec) -> ClientResult<Quiz> {
        let url = self.endpoint(&["api", "quiz", "generate"]);
        self.send(StageKind::Quiz, self.http_client.post(url).json(spec))
            .await
    }

    async fn fetch_simulation(&self, quiz_id: &ResourceId) -> ClientResult<SimulationResponse> {
        let url = self.endpoint(&["api", "simulation", quiz_id.as_str()]);
        self.send(StageKind::Simulation, self.http_client.get(url))
            .await
    }

    async fn start_dimensionality_analysis(
        &self,
        request: &AnalysisRequest,
    ) -> ClientResult<DimensionalityResult> {
        let url = self.endpoint(&["api", "analysis", "dimensionality"]);
        self.send(StageKind::Analysis, self.http_client.post(url).json(request))
            .await
    }

    async fn refine_items(
        &self,
        request: &RefinementRequest,
    ) -> ClientResult<DimensionalityResult> {
        let url = self.endpoint(&["api", "analysis", "refine-items"]);
        self.send(StageKind::Analysis, self.http_client.post(url).json(request))
            .await
    }

    async fn fit_model(&self, request: &ModelFitRequest) -> ClientResult<FittedModel> {
        let url = self.endpoint(&["api", "analysis", "irt-fit"]);
        self.send(StageKind::Results, self.http_client.post(url).json(request))
            .await
    }

    async fn fetch_model_fit(
        &self,
        results_id: &ResourceId,
        model_type: ModelType,
    ) -> ClientResult<ModelFitResult> {
        let mut url = self.endpoint(&["api", "analysis", "irt-fit", results_id.as_str()]);
        url.query_pairs_mut()
            .append_pair("model", model_type.as_str());
        self.send(StageKind::Results, self.http_client.get(url))
            .await
    }
}

fn transport_failure(stage: StageKind, err: reqwest::Error) -> StageFailure {
    if err.is_timeout() {
        StageFailure::timeout(stage, err.to_string())
    } else {
        StageFailure::network(stage, err.to_string())
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
