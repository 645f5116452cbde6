//! Quizflow CLI - drive the test-construction pipeline from a terminal
//!
//! ## Commands
//!
//! - `run`: generate a quiz, simulate responses, screen dimensionality,
//!   refine flagged items and fit an IRT model
//! - `quiz`: print a previously generated quiz
//! - `fit`: print the fit of a given model for an existing results id

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn, Level};

use quizflow_client::{ClientConfig, HttpPipelineClient, PipelineClient};
use quizflow_core::telemetry::init_tracing;
use quizflow_core::{
    OrchestratorConfig, PipelineError, PipelineOrchestrator, StageTimeouts, WorkflowSnapshot,
    WorkflowState,
};
use quizflow_domain::{
    AnalysisMethod, ItemType, ModelFitResult, ModelType, QuizSpec, ResourceId, SchoolLevel,
    StageKind,
};

#[derive(Parser)]
#[command(name = "quizflow")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Psychometric test-construction pipeline driver", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Statistics backend base URL
    #[arg(
        long,
        global = true,
        env = "QUIZFLOW_API_URL",
        default_value = quizflow_client::DEFAULT_API_URL
    )]
    api_url: String,

    /// Deadline for every backend call, in seconds
    /// (default: 30 for quiz and simulation, 120 for analysis and fitting)
    #[arg(long, global = true, env = "QUIZFLOW_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for one knowledge point
    Run(RunArgs),

    /// Print a generated quiz
    Quiz {
        /// Quiz identifier
        quiz_id: String,
    },

    /// Print the fit of a model for an existing results id
    Fit {
        /// Results identifier returned by a previous run
        results_id: String,

        /// IRT model to fetch
        #[arg(short, long, default_value = "rasch")]
        model: ModelType,
    },
}

#[derive(clap::Args, Debug, Clone)]
struct RunArgs {
    /// Topic the quiz should assess
    #[arg(short, long)]
    knowledge_point: String,

    #[arg(long, default_value = "primary")]
    school_level: SchoolLevel,

    #[arg(long, default_value = "dichotomous")]
    item_type: ItemType,

    /// Number of items to generate
    #[arg(short, long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..=50))]
    num_items: u32,

    /// Dimensionality screening method
    #[arg(long, default_value = "efa")]
    method: AnalysisMethod,

    /// IRT model for the initial fit
    #[arg(short, long, default_value = "rasch")]
    model: ModelType,

    /// Maximum refinement cycles before giving up
    #[arg(long, default_value_t = 3)]
    max_refinements: u32,

    /// Ask before each refinement instead of refining automatically
    #[arg(long)]
    manual_refine: bool,

    /// Retries for network errors and timeouts
    #[arg(long, default_value_t = 2)]
    retries: u32,

    /// Additional models to fetch once the run completes (e.g. 2pl,3pl)
    #[arg(long, value_delimiter = ',')]
    compare: Vec<ModelType>,

    /// Write the final snapshot as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl RunArgs {
    fn spec(&self) -> QuizSpec {
        QuizSpec::new(self.knowledge_point.clone())
            .with_school_level(self.school_level)
            .with_item_type(self.item_type)
            .with_num_items(self.num_items)
    }

    fn orchestrator_config(&self, timeout_secs: Option<u64>) -> OrchestratorConfig {
        let timeouts = timeout_secs
            .map(|secs| StageTimeouts::uniform(Duration::from_secs(secs)))
            .unwrap_or_default();
        OrchestratorConfig::new()
            .with_timeouts(timeouts)
            .with_max_refinements(self.max_refinements)
            .with_auto_refine(!self.manual_refine)
            .with_analysis_method(self.method)
            .with_default_model(self.model)
    }
}

/// A model fetched after completion for side-by-side comparison.
#[derive(Debug, Serialize)]
struct ModelComparison {
    model: ModelType,
    #[serde(skip_serializing_if = "Option::is_none")]
    fit: Option<ModelFitResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct RunReport {
    snapshot: WorkflowSnapshot,
    comparisons: Vec<ModelComparison>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let mut config = ClientConfig::new(&cli.api_url);
    if let Some(secs) = cli.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    let client = HttpPipelineClient::new(config).context("Failed to configure backend client")?;

    match cli.command {
        Commands::Run(args) => {
            let orchestrator = Arc::new(PipelineOrchestrator::new(
                Arc::new(client),
                args.orchestrator_config(cli.timeout_secs),
            ));
            cmd_run(orchestrator, &args, &mut stdin_confirm).await
        }
        Commands::Quiz { quiz_id } => cmd_quiz(&client, &quiz_id).await,
        Commands::Fit { results_id, model } => cmd_fit(&client, &results_id, model).await,
    }
}

/// Drive one workflow, print the report and optionally persist it.
async fn cmd_run(
    orchestrator: Arc<PipelineOrchestrator>,
    args: &RunArgs,
    confirm: &mut dyn FnMut(&WorkflowSnapshot) -> bool,
) -> Result<()> {
    // Ctrl-C cancels the pending backend call instead of killing the process.
    let interrupt = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if let Some(stage) = orchestrator.cancel() {
                    warn!(stage = %stage, "Interrupted, cancelling in-flight call");
                }
            }
        })
    };

    let outcome = drive_workflow(&orchestrator, args.spec(), args.retries, confirm).await;
    let comparisons = match &outcome {
        Ok(snapshot) if snapshot.state == WorkflowState::Complete => {
            compare_models(&orchestrator, &args.compare).await
        }
        _ => Vec::new(),
    };
    interrupt.abort();

    let report = RunReport {
        snapshot: orchestrator.snapshot(),
        comparisons,
    };
    println!("{}", render_report(&report));

    if let Some(path) = &args.output {
        write_report(&report, path)?;
        println!("Wrote snapshot to {:?}", path);
    }

    match outcome {
        Ok(snapshot) if snapshot.awaiting_refinement => {
            anyhow::bail!("Stopped before refinement; flagged items were not refined")
        }
        Ok(_) => Ok(()),
        Err(e) => Err(e).context("Pipeline run did not complete"),
    }
}

/// Run the workflow to completion, retrying retryable failures up to
/// `retries` times and asking `confirm` before each manual refinement.
async fn drive_workflow(
    orchestrator: &PipelineOrchestrator,
    spec: QuizSpec,
    retries: u32,
    confirm: &mut dyn FnMut(&WorkflowSnapshot) -> bool,
) -> std::result::Result<WorkflowSnapshot, PipelineError> {
    let mut retries_left = retries;
    let mut outcome = orchestrator.submit_quiz_spec(spec).await;

    loop {
        outcome = match outcome {
            Ok(snapshot) if snapshot.awaiting_refinement => {
                if !confirm(&snapshot) {
                    return Ok(snapshot);
                }
                orchestrator.request_refinement().await
            }
            Err(PipelineError::Stage(failure)) if failure.is_retryable() && retries_left > 0 => {
                retries_left -= 1;
                warn!(
                    stage = %failure.stage,
                    kind = %failure.kind,
                    retries_left = retries_left,
                    "Retrying stalled stage"
                );
                orchestrator.retry().await
            }
            other => return other,
        };
    }
}

async fn compare_models(
    orchestrator: &PipelineOrchestrator,
    models: &[ModelType],
) -> Vec<ModelComparison> {
    let mut comparisons = Vec::with_capacity(models.len());
    for &model in models {
        let comparison = match orchestrator.select_model(model).await {
            Ok(snapshot) => ModelComparison {
                model,
                fit: snapshot.model_fit,
                error: None,
            },
            Err(e) => {
                warn!(model = %model, error = %e, "Model comparison failed");
                ModelComparison {
                    model,
                    fit: None,
                    error: Some(e.to_string()),
                }
            }
        };
        comparisons.push(comparison);
    }
    comparisons
}

/// Prompt on the terminal before a manual refinement.
fn stdin_confirm(snapshot: &WorkflowSnapshot) -> bool {
    let flagged = snapshot
        .dimensionality
        .as_ref()
        .map(|d| d.problematic_items.join(", "))
        .unwrap_or_default();
    print!("Not unidimensional; refine flagged items [{}]? [y/N] ", flagged);
    if std::io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    let read = tokio::task::block_in_place(|| std::io::stdin().lock().read_line(&mut answer));
    read.is_ok() && matches!(answer.trim(), "y" | "Y" | "yes")
}

fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write to {:?}", path))
}

fn render_report(report: &RunReport) -> String {
    let snapshot = &report.snapshot;
    let mut out = format!("Workflow {}: {}\n", snapshot.workflow_id, snapshot.state);

    for stage in StageKind::ALL {
        let id = snapshot
            .resources
            .id(stage)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let detail = match stage {
            StageKind::Quiz => snapshot
                .quiz
                .as_ref()
                .map(|q| format!("{} items", q.items.len())),
            StageKind::Simulation => snapshot.simulation.as_ref().map(|s| {
                format!(
                    "{} respondents, mean score {:.2}",
                    s.responses.len(),
                    s.summary_statistics.mean
                )
            }),
            StageKind::Analysis => snapshot.dimensionality.as_ref().map(|d| {
                format!(
                    "{}, {}, {} refinement(s)",
                    d.method.as_str(),
                    if d.is_unidimensional {
                        "unidimensional"
                    } else {
                        "not unidimensional"
                    },
                    snapshot.refinements
                )
            }),
            StageKind::Results => snapshot.selected_model.map(|m| m.to_string()),
        };
        let line = match detail {
            Some(detail) => format!("  {:<11} {} ({})\n", stage.as_str(), id, detail),
            None => format!("  {:<11} {}\n", stage.as_str(), id),
        };
        out.push_str(&line);
    }

    if let Some(fit) = &snapshot.model_fit {
        out.push_str(&render_fit(fit));
    }
    for comparison in &report.comparisons {
        match (&comparison.fit, &comparison.error) {
            (Some(fit), _) => out.push_str(&render_fit(fit)),
            (None, Some(error)) => {
                out.push_str(&format!("  {}: unavailable ({})\n", comparison.model, error))
            }
            (None, None) => {}
        }
    }
    if let Some(error) = &snapshot.last_error {
        out.push_str(&format!("  last error: {}\n", error));
    }
    if snapshot.retry_available {
        out.push_str("  a retry is available for the stalled stage\n");
    }
    out
}

fn render_fit(fit: &ModelFitResult) -> String {
    let stats = fit
        .model_fit_statistics
        .iter()
        .map(|(name, value)| format!("{}={:.3}", name, value))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "  {} fit: {} items{}{}\n",
        fit.model_type,
        fit.item_parameters.len(),
        if stats.is_empty() { "" } else { ", " },
        stats
    )
}

/// Print a generated quiz as JSON.
async fn cmd_quiz(client: &HttpPipelineClient, quiz_id: &str) -> Result<()> {
    let quiz_id = ResourceId::try_from(quiz_id.to_string()).context("Invalid quiz id")?;
    let quiz = client.fetch_quiz(&quiz_id).await?;
    info!(quiz_id = %quiz.id, items = quiz.items.len(), "Fetched quiz");
    println!("{}", serde_json::to_string_pretty(&quiz)?);
    Ok(())
}

/// Print one model fit for an existing results id.
async fn cmd_fit(client: &dyn PipelineClient, results_id: &str, model: ModelType) -> Result<()> {
    let results_id = ResourceId::try_from(results_id.to_string()).context("Invalid results id")?;
    let fit = client.fetch_model_fit(&results_id, model).await?;
    fit.validate(model)
        .with_context(|| format!("Backend returned an unusable {} fit", model))?;
    print!("{}", render_fit(&fit));
    println!("{}", serde_json::to_string_pretty(&fit.item_parameters)?);
    Ok(())
}
