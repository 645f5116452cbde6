//! Quizflow Core: drives the test-construction pipeline
//!
//! ## Key Components
//!
//! - `PipelineOrchestrator`: the quiz → simulation → analysis → results
//!   state machine, with retry, cancellation and model switching
//! - `RefinementController`: bounded advance/refine policy applied to each
//!   dimensionality result
//! - `OrchestratorConfig`: per-stage deadlines and branch settings
//! - `telemetry` / `obs`: tracing setup and structured lifecycle events

pub mod config;
mod error;
pub mod obs;
pub mod orchestrator;
pub mod refinement;
pub mod state;
pub mod telemetry;

pub use config::{OrchestratorConfig, StageTimeouts};
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::PipelineOrchestrator;
pub use refinement::{RefinementController, RefinementDecision, RefinementPolicy};
pub use state::{WorkflowSnapshot, WorkflowState};
