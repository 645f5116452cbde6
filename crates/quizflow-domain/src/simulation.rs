//! Simulated respondent data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ContractError;
use crate::resource::ResourceId;
use crate::ContractResult;

/// One simulated student's answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentResponse {
    pub student_id: String,
    /// item-id → answer
    pub responses: BTreeMap<String, String>,
    /// Proportion correct, in [0, 1].
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Response matrix produced by exercising a quiz against simulated students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResponse {
    /// Simulation identifier. The backend keys simulations by quiz, so this
    /// is usually absent and the quiz identifier stands in for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    pub quiz_id: ResourceId,
    #[serde(default)]
    pub responses: Vec<StudentResponse>,
    #[serde(default)]
    pub summary_statistics: SummaryStatistics,
}

impl SimulationResponse {
    /// Identifier the next stage should use for this simulation.
    pub fn simulation_id(&self) -> ResourceId {
        self.id.clone().unwrap_or_else(|| self.quiz_id.clone())
    }

    /// Distinct item ids answered across all respondents.
    pub fn item_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .responses
            .iter()
            .flat_map(|r| r.responses.keys().cloned())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Check the payload against the quiz it was requested for.
    pub fn validate(&self, requested_quiz: &ResourceId) -> ContractResult<()> {
        if &self.quiz_id != requested_quiz {
            return Err(ContractError::new(format!(
                "simulation belongs to quiz {} but quiz {} was requested",
                self.quiz_id, requested_quiz
            )));
        }
        if let Some(bad) = self
            .responses
            .iter()
            .find(|r| !(0.0..=1.0).contains(&r.score))
        {
            return Err(ContractError::new(format!(
                "student {} has score {} outside [0, 1]",
                bad.student_id, bad.score
            )));
        }
        Ok(())
    }
}
