//! Dimensionality screening and item refinement.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ContractError;
use crate::resource::ResourceId;
use crate::ContractResult;

/// Dimensionality screening method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMethod {
    /// Exploratory factor analysis.
    #[default]
    Efa,
    /// Normal-ogive harmonic analysis.
    Noharm,
}

impl AnalysisMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMethod::Efa => "efa",
            AnalysisMethod::Noharm => "noharm",
        }
    }
}

impl std::str::FromStr for AnalysisMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "efa" => Ok(AnalysisMethod::Efa),
            "noharm" => Ok(AnalysisMethod::Noharm),
            other => Err(format!("unknown analysis method: {other}")),
        }
    }
}

/// Request to screen a simulation's response matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub simulation_id: ResourceId,
    pub analysis_type: AnalysisMethod,
}

impl AnalysisRequest {
    pub fn new(simulation_id: ResourceId, analysis_type: AnalysisMethod) -> Self {
        Self {
            simulation_id,
            analysis_type,
        }
    }
}

/// Outcome of a dimensionality screen.
///
/// `is_unidimensional` is the branch signal; `problematic_items` only says
/// what to refine when it is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionalityResult {
    /// Analysis identifier, when the backend assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    pub method: AnalysisMethod,
    pub is_unidimensional: bool,
    #[serde(default)]
    pub factor_loadings: BTreeMap<String, f64>,
    #[serde(default)]
    pub problematic_items: Vec<String>,
    #[serde(default)]
    pub fit_statistics: BTreeMap<String, f64>,
}

impl DimensionalityResult {
    /// Every problematic item must have a factor loading.
    pub fn validate(&self) -> ContractResult<()> {
        if let Some(missing) = self
            .problematic_items
            .iter()
            .find(|item| !self.factor_loadings.contains_key(item.as_str()))
        {
            return Err(ContractError::new(format!(
                "problematic item {missing} has no factor loading"
            )));
        }
        Ok(())
    }
}

/// Ephemeral request to drop or rework flagged items and re-screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementRequest {
    pub simulation_id: ResourceId,
    pub problematic_items: Vec<String>,
}
