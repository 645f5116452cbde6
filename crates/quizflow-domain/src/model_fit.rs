//! IRT model fitting requests and results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ContractError;
use crate::resource::ResourceId;
use crate::ContractResult;

/// IRT measurement model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    #[serde(rename = "rasch")]
    Rasch,
    #[serde(rename = "2pl")]
    TwoPl,
    #[serde(rename = "3pl")]
    ThreePl,
}

impl ModelType {
    /// Model fitted when proceeding from a unidimensional analysis unless
    /// the caller picks another.
    pub const DEFAULT: ModelType = ModelType::Rasch;

    pub const ALL: [ModelType; 3] = [ModelType::Rasch, ModelType::TwoPl, ModelType::ThreePl];

    /// Number of parameters estimated per item.
    ///
    /// Rasch: difficulty. 2PL: discrimination, difficulty. 3PL: + guessing.
    pub fn arity(&self) -> usize {
        match self {
            ModelType::Rasch => 1,
            ModelType::TwoPl => 2,
            ModelType::ThreePl => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Rasch => "rasch",
            ModelType::TwoPl => "2pl",
            ModelType::ThreePl => "3pl",
        }
    }
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::DEFAULT
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rasch" | "1pl" => Ok(ModelType::Rasch),
            "2pl" => Ok(ModelType::TwoPl),
            "3pl" => Ok(ModelType::ThreePl),
            other => Err(format!("unknown model type: {other}")),
        }
    }
}

/// Request to fit a measurement model to a simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFitRequest {
    pub simulation_id: ResourceId,
    pub model_type: ModelType,
}

impl ModelFitRequest {
    /// Request a fit with [`ModelType::DEFAULT`].
    pub fn new(simulation_id: ResourceId) -> Self {
        Self {
            simulation_id,
            model_type: ModelType::DEFAULT,
        }
    }

    pub fn with_model(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }
}

/// Test and item information over a theta grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestInformation {
    /// Named curves, e.g. `theta` and `information`.
    #[serde(default)]
    pub test_information_curve: BTreeMap<String, Vec<f64>>,
    /// item-id → named curves
    #[serde(default)]
    pub item_information_curves: BTreeMap<String, BTreeMap<String, Vec<f64>>>,
    pub reliability_coefficient: f64,
    #[serde(default)]
    pub measurement_precision: BTreeMap<String, f64>,
}

/// Fitted model parameters and fit statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFitResult {
    pub model_type: ModelType,
    /// item-id → parameters, arity given by `model_type`
    pub item_parameters: BTreeMap<String, Vec<f64>>,
    #[serde(default)]
    pub model_fit_statistics: BTreeMap<String, f64>,
    #[serde(default)]
    pub item_fit_statistics: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_information: Option<TestInformation>,
}

impl ModelFitResult {
    /// Check the result against the model that was asked for.
    pub fn validate(&self, requested: ModelType) -> ContractResult<()> {
        if self.model_type != requested {
            return Err(ContractError::new(format!(
                "requested {} fit but received {}",
                requested, self.model_type
            )));
        }
        let arity = requested.arity();
        if let Some((item, params)) = self
            .item_parameters
            .iter()
            .find(|(_, params)| params.len() != arity)
        {
            return Err(ContractError::new(format!(
                "{} item {} has {} parameters, expected {}",
                requested,
                item,
                params.len(),
                arity
            )));
        }
        if let Some(info) = &self.test_information {
            if !(0.0..=1.0).contains(&info.reliability_coefficient) {
                return Err(ContractError::new(format!(
                    "reliability coefficient {} outside [0, 1]",
                    info.reliability_coefficient
                )));
            }
        }
        Ok(())
    }
}

/// Response to a fit request: the results identifier plus the fit itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub id: ResourceId,
    #[serde(flatten)]
    pub result: ModelFitResult,
}
