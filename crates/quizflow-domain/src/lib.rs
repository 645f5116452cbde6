//! Quizflow Domain: data model for the test-construction pipeline
//!
//! Every type that crosses the boundary between the pipeline driver and the
//! statistical backend lives here, together with the invariants the driver
//! enforces on what the backend sends back.
//!
//! ## Key Components
//!
//! - `QuizSpec`: what the user asks for (validated before any remote call)
//! - `StageResource`: opaque handle to one stage's server-side artifact
//! - `DimensionalityResult`: outcome of the EFA/NOHARM screen
//! - `ModelFitResult`: Rasch/2PL/3PL item parameters and fit statistics
//! - `StageFailure`: the failure taxonomy shared by client and orchestrator

pub mod analysis;
mod error;
pub mod model_fit;
pub mod quiz;
pub mod resource;
pub mod simulation;

pub use analysis::{AnalysisMethod, AnalysisRequest, DimensionalityResult, RefinementRequest};
pub use error::{ContractError, FailureKind, StageFailure, ValidationError};
pub use model_fit::{FittedModel, ModelFitRequest, ModelFitResult, ModelType, TestInformation};
pub use quiz::{ItemType, Quiz, QuizItem, QuizSpec, SchoolLevel, MAX_ITEMS, MIN_ITEMS};
pub use resource::{ResourceChain, ResourceId, ResourceStatus, StageKind, StageResource};
pub use simulation::{SimulationResponse, StudentResponse, SummaryStatistics};

/// Result type for backend response validation
pub type ContractResult<T> = std::result::Result<T, ContractError>;
