//! Quiz specification and generated quiz.

use serde::{Deserialize, Serialize};

use crate::error::{ContractError, ValidationError};
use crate::resource::ResourceId;
use crate::ContractResult;

/// Smallest quiz the backend will generate.
pub const MIN_ITEMS: u32 = 1;

/// Largest quiz the backend will generate.
pub const MAX_ITEMS: u32 = 50;

/// Target audience of a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchoolLevel {
    #[default]
    Primary,
    Middle,
    Undergraduate,
}

impl SchoolLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchoolLevel::Primary => "primary",
            SchoolLevel::Middle => "middle",
            SchoolLevel::Undergraduate => "undergraduate",
        }
    }
}

impl std::str::FromStr for SchoolLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(SchoolLevel::Primary),
            "middle" => Ok(SchoolLevel::Middle),
            "undergraduate" => Ok(SchoolLevel::Undergraduate),
            other => Err(format!("unknown school level: {other}")),
        }
    }
}

/// Scoring scheme of quiz items.
///
/// `Polynomous` keeps the backend's spelling on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    #[default]
    Dichotomous,
    Polynomous,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Dichotomous => "dichotomous",
            ItemType::Polynomous => "polynomous",
        }
    }
}

impl std::str::FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dichotomous" => Ok(ItemType::Dichotomous),
            "polynomous" | "polytomous" => Ok(ItemType::Polynomous),
            other => Err(format!("unknown item type: {other}")),
        }
    }
}

/// User request for a quiz. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSpec {
    pub knowledge_point: String,
    pub school_level: SchoolLevel,
    pub item_type: ItemType,
    pub num_items: u32,
}

impl QuizSpec {
    /// Create a spec with the default level, item type and length (5 items).
    pub fn new(knowledge_point: impl Into<String>) -> Self {
        Self {
            knowledge_point: knowledge_point.into(),
            school_level: SchoolLevel::default(),
            item_type: ItemType::default(),
            num_items: 5,
        }
    }

    pub fn with_school_level(mut self, level: SchoolLevel) -> Self {
        self.school_level = level;
        self
    }

    pub fn with_item_type(mut self, item_type: ItemType) -> Self {
        self.item_type = item_type;
        self
    }

    pub fn with_num_items(mut self, num_items: u32) -> Self {
        self.num_items = num_items;
        self
    }

    /// Check the spec before it is sent anywhere.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.knowledge_point.trim().is_empty() {
            return Err(ValidationError::EmptyKnowledgePoint);
        }
        if !(MIN_ITEMS..=MAX_ITEMS).contains(&self.num_items) {
            return Err(ValidationError::ItemCountOutOfRange {
                actual: self.num_items,
                min: MIN_ITEMS,
                max: MAX_ITEMS,
            });
        }
        Ok(())
    }
}

/// One generated multiple-choice item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    pub id: u32,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Quiz as returned by the generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: ResourceId,
    #[serde(default)]
    pub knowledge_point: Option<String>,
    #[serde(default)]
    pub school_level: Option<SchoolLevel>,
    #[serde(default)]
    pub items: Vec<QuizItem>,
}

impl Quiz {
    /// A quiz carrying only its identifier.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(id),
            knowledge_point: None,
            school_level: None,
            items: Vec::new(),
        }
    }

    pub fn validate(&self) -> ContractResult<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(ContractError::new("quiz response has an empty id"));
        }
        Ok(())
    }
}
