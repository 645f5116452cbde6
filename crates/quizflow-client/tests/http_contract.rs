//! HTTP adapter contract tests against a mock backend.

use std::time::Duration;

use mockito::{Matcher, Server};
use quizflow_client::{ClientConfig, HttpPipelineClient, PipelineClient};
use quizflow_domain::{
    AnalysisMethod, AnalysisRequest, FailureKind, ModelFitRequest, ModelType, QuizSpec,
    RefinementRequest, ResourceId, SchoolLevel, StageKind,
};
use serde_json::json;

fn client_for(server: &Server) -> HttpPipelineClient {
    HttpPipelineClient::new(ClientConfig::new(&server.url())).expect("client")
}

#[tokio::test]
async fn generate_quiz_posts_spec_and_decodes_id() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/quiz/generate")
        .match_body(Matcher::Json(json!({
            "knowledge_point": "fractions",
            "school_level": "primary",
            "item_type": "dichotomous",
            "num_items": 5
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "Q1",
                "knowledge_point": "fractions",
                "school_level": "primary",
                "items": [{
                    "id": 1,
                    "question": "What is 1/2 + 1/4?",
                    "options": ["3/4", "2/6", "1/8", "1"],
                    "correct_answer": "3/4"
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let quiz = client_for(&server)
        .generate_quiz(&QuizSpec::new("fractions").with_school_level(SchoolLevel::Primary))
        .await
        .expect("quiz");

    assert_eq!(quiz.id, ResourceId::new("Q1"));
    assert_eq!(quiz.items.len(), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn fetch_simulation_uses_quiz_id_in_path() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/simulation/Q1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "quiz_id": "Q1",
                "responses": [
                    {"student_id": "s1", "responses": {"item_1": "A"}, "score": 1.0}
                ],
                "summary_statistics": {"mean": 1.0, "std_dev": 0.0, "min": 1.0, "max": 1.0}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let sim = client_for(&server)
        .fetch_simulation(&ResourceId::new("Q1"))
        .await
        .expect("simulation");

    assert_eq!(sim.simulation_id(), ResourceId::new("Q1"));
    assert_eq!(sim.responses.len(), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn dimensionality_and_refinement_bodies() {
    let mut server = Server::new_async().await;
    let analysis = server
        .mock("POST", "/api/analysis/dimensionality")
        .match_body(Matcher::Json(
            json!({"simulation_id": "S1", "analysis_type": "noharm"}),
        ))
        .with_status(200)
        .with_body(
            json!({
                "id": "A1",
                "method": "noharm",
                "is_unidimensional": false,
                "factor_loadings": {"item_1": 0.6, "item_3": 0.1},
                "problematic_items": ["item_3"],
                "fit_statistics": {"rmsr": 0.08}
            })
            .to_string(),
        )
        .create_async()
        .await;
    let refine = server
        .mock("POST", "/api/analysis/refine-items")
        .match_body(Matcher::Json(
            json!({"simulation_id": "S1", "problematic_items": ["item_3"]}),
        ))
        .with_status(200)
        .with_body(
            json!({
                "method": "noharm",
                "is_unidimensional": true,
                "factor_loadings": {"item_1": 0.6},
                "problematic_items": [],
                "fit_statistics": {"rmsr": 0.03}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let first = client
        .start_dimensionality_analysis(&AnalysisRequest::new(
            ResourceId::new("S1"),
            AnalysisMethod::Noharm,
        ))
        .await
        .expect("analysis");
    assert_eq!(first.id, Some(ResourceId::new("A1")));
    assert!(!first.is_unidimensional);

    let refined = client
        .refine_items(&RefinementRequest {
            simulation_id: ResourceId::new("S1"),
            problematic_items: first.problematic_items.clone(),
        })
        .await
        .expect("refinement");
    assert!(refined.is_unidimensional);

    analysis.assert_async().await;
    refine.assert_async().await;
}

#[tokio::test]
async fn fit_and_fetch_model_fit() {
    let mut server = Server::new_async().await;
    let fit = server
        .mock("POST", "/api/analysis/irt-fit")
        .match_body(Matcher::Json(json!({"simulation_id": "S1", "model_type": "rasch"})))
        .with_status(200)
        .with_body(
            json!({
                "id": "R1",
                "model_type": "rasch",
                "item_parameters": {"item_1": [0.2], "item_2": [-0.4]},
                "model_fit_statistics": {"aic": 512.0, "bic": 520.3},
                "item_fit_statistics": {}
            })
            .to_string(),
        )
        .create_async()
        .await;
    let fetch = server
        .mock("GET", "/api/analysis/irt-fit/R1")
        .match_query(Matcher::UrlEncoded("model".into(), "2pl".into()))
        .with_status(200)
        .with_body(
            json!({
                "model_type": "2pl",
                "item_parameters": {"item_1": [1.1, 0.2], "item_2": [0.8, -0.4]},
                "model_fit_statistics": {"aic": 498.1}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let fitted = client
        .fit_model(&ModelFitRequest::new(ResourceId::new("S1")))
        .await
        .expect("fit");
    assert_eq!(fitted.id, ResourceId::new("R1"));
    assert_eq!(fitted.result.model_type, ModelType::Rasch);

    let switched = client
        .fetch_model_fit(&fitted.id, ModelType::TwoPl)
        .await
        .expect("fetch");
    assert_eq!(switched.item_parameters["item_1"].len(), 2);

    fit.assert_async().await;
    fetch.assert_async().await;
}

#[tokio::test]
async fn server_error_maps_to_server_failure() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/analysis/irt-fit")
        .with_status(500)
        .with_body(r#"{"detail": "3PL model not implemented yet"}"#)
        .create_async()
        .await;

    let err = client_for(&server)
        .fit_model(&ModelFitRequest::new(ResourceId::new("S1")).with_model(ModelType::ThreePl))
        .await
        .unwrap_err();

    assert_eq!(err.stage, StageKind::Results);
    assert_eq!(err.kind, FailureKind::ServerError);
    assert!(err.detail.contains("500"));
    assert!(err.detail.contains("3PL model not implemented"));
}

#[tokio::test]
async fn not_found_is_not_retryable() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/simulation/missing")
        .with_status(404)
        .with_body(r#"{"detail": "Quiz not found"}"#)
        .create_async()
        .await;

    let err = client_for(&server)
        .fetch_simulation(&ResourceId::new("missing"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::ServerError);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn malformed_body_is_contract_violation() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/analysis/dimensionality")
        .with_status(200)
        .with_body(r#"{"method": "efa"}"#)
        .create_async()
        .await;

    let err = client_for(&server)
        .start_dimensionality_analysis(&AnalysisRequest::new(
            ResourceId::new("S1"),
            AnalysisMethod::Efa,
        ))
        .await
        .unwrap_err();

    assert_eq!(err.stage, StageKind::Analysis);
    assert_eq!(err.kind, FailureKind::ContractViolation);
}

#[tokio::test]
async fn empty_id_is_contract_violation() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/quiz/generate")
        .with_status(200)
        .with_body(r#"{"id": ""}"#)
        .create_async()
        .await;

    let err = client_for(&server)
        .generate_quiz(&QuizSpec::new("fractions"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::ContractViolation);
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    // Port 9 (discard) on localhost is closed in test environments.
    let client = HttpPipelineClient::new(
        ClientConfig::new("http://127.0.0.1:9").with_timeout(Duration::from_secs(5)),
    )
    .expect("client");

    let err = client
        .fetch_simulation(&ResourceId::new("Q1"))
        .await
        .unwrap_err();

    assert!(matches!(
        err.kind,
        FailureKind::NetworkError | FailureKind::Timeout
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn fetch_quiz_reads_existing_quiz() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/quiz/quiz/Q1")
        .with_status(200)
        .with_body(r#"{"id": "Q1", "items": []}"#)
        .create_async()
        .await;

    let quiz = client_for(&server)
        .fetch_quiz(&ResourceId::new("Q1"))
        .await
        .expect("quiz");

    assert_eq!(quiz.id.as_str(), "Q1");
    mock.assert_async().await;
}
