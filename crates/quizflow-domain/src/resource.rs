//! Stage resources: opaque handles to server-side artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ContractError;

/// Pipeline stage that owns a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Quiz,
    Simulation,
    Analysis,
    Results,
}

impl StageKind {
    /// All stages in pipeline order.
    pub const ALL: [StageKind; 4] = [
        StageKind::Quiz,
        StageKind::Simulation,
        StageKind::Analysis,
        StageKind::Results,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Quiz => "quiz",
            StageKind::Simulation => "simulation",
            StageKind::Analysis => "analysis",
            StageKind::Results => "results",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque backend identifier.
///
/// Compared by equality only; the driver never parses or orders these.
/// Deserialization rejects the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        ResourceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceId {
    type Error = ContractError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.trim().is_empty() {
            return Err(ContractError::new("resource identifier must not be empty"));
        }
        Ok(ResourceId(s))
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle tag of a stage resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Pending,
    Ready,
    Failed,
}

/// Handle to one stage's output. Read-only once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResource {
    pub id: ResourceId,
    pub stage: StageKind,
    pub status: ResourceStatus,
    pub created_at: DateTime<Utc>,
}

impl StageResource {
    /// A resource for a stage whose artifact is available.
    pub fn ready(stage: StageKind, id: ResourceId) -> Self {
        Self {
            id,
            stage,
            status: ResourceStatus::Ready,
            created_at: Utc::now(),
        }
    }
}

/// The linear quiz → simulation → analysis → results history.
///
/// Holds at most one resource per stage; inserting replaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChain {
    pub quiz: Option<StageResource>,
    pub simulation: Option<StageResource>,
    pub analysis: Option<StageResource>,
    pub results: Option<StageResource>,
}

impl ResourceChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `resource` in its stage slot, superseding any previous one.
    pub fn insert(&mut self, resource: StageResource) {
        let stage = resource.stage;
        *self.slot_mut(stage) = Some(resource);
    }

    pub fn get(&self, stage: StageKind) -> Option<&StageResource> {
        match stage {
            StageKind::Quiz => self.quiz.as_ref(),
            StageKind::Simulation => self.simulation.as_ref(),
            StageKind::Analysis => self.analysis.as_ref(),
            StageKind::Results => self.results.as_ref(),
        }
    }

    /// Identifier for `stage`, if that stage has produced one.
    pub fn id(&self, stage: StageKind) -> Option<&ResourceId> {
        self.get(stage).map(|r| &r.id)
    }

    /// The most advanced resource in the chain.
    pub fn current(&self) -> Option<&StageResource> {
        StageKind::ALL.iter().rev().find_map(|stage| self.get(*stage))
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_none()
    }

    fn slot_mut(&mut self, stage: StageKind) -> &mut Option<StageResource> {
        match stage {
            StageKind::Quiz => &mut self.quiz,
            StageKind::Simulation => &mut self.simulation,
            StageKind::Analysis => &mut self.analysis,
            StageKind::Results => &mut self.results,
        }
    }
}
