use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A stored status string that names no known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown status: {0}")]
pub struct UnknownStatus(pub String);

/// Vegan status of a single ingredient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum VeganStatus {
    Vegan,
    NonVegan,
    MaybeVegan,
}

impl VeganStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VeganStatus::Vegan => "vegan",
            VeganStatus::NonVegan => "non_vegan",
            VeganStatus::MaybeVegan => "maybe_vegan",
        }
    }
}

impl FromStr for VeganStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vegan" => Ok(VeganStatus::Vegan),
            "non_vegan" => Ok(VeganStatus::NonVegan),
            "maybe_vegan" => Ok(VeganStatus::MaybeVegan),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Overall verdict for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Vegan,
    NonVegan,
    MaybeVegan,
    Unclear,
    Error,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Vegan => "vegan",
            CheckStatus::NonVegan => "non_vegan",
            CheckStatus::MaybeVegan => "maybe_vegan",
            CheckStatus::Unclear => "unclear",
            CheckStatus::Error => "error",
        }
    }
}

impl FromStr for CheckStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vegan" => Ok(CheckStatus::Vegan),
            "non_vegan" => Ok(CheckStatus::NonVegan),
            "maybe_vegan" => Ok(CheckStatus::MaybeVegan),
            "unclear" => Ok(CheckStatus::Unclear),
            "error" => Ok(CheckStatus::Error),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// A known ingredient from the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientRecord {
    pub name: String,
    pub vegan_status: VeganStatus,
    #[serde(default)]
    pub function_logic: Option<String>,
    #[serde(default)]
    pub nourishment_fact: Option<String>,
    /// Direct product swap (e.g. "maple syrup").
    #[serde(default)]
    pub swap_static: Option<String>,
    /// Swap that depends on what the ingredient does in the recipe.
    #[serde(default)]
    pub swap_functional: Option<String>,
    #[serde(default)]
    pub is_composite: bool,
    #[serde(default)]
    pub components: Vec<String>,
    /// How hard the swap is, 1 (trivial) to 5 (hard).
    #[serde(default)]
    pub difficulty_weight: Option<i32>,
}

/// Where a flagged item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum FlagSource {
    KnowledgeBase,
    Oracle,
}

/// A non-vegan or uncertain ingredient surfaced in a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FlaggedItem {
    pub name: String,
    pub vegan_status: VeganStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_logic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nourishment_fact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_static: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_functional: Option<String>,
    #[serde(default)]
    pub is_composite: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_weight: Option<i32>,
    pub source: FlagSource,
}

impl From<&IngredientRecord> for FlaggedItem {
    fn from(record: &IngredientRecord) -> Self {
        Self {
            name: record.name.clone(),
            vegan_status: record.vegan_status,
            function_logic: record.function_logic.clone(),
            nourishment_fact: record.nourishment_fact.clone(),
            sub_reasoning: None,
            swap_static: record.swap_static.clone(),
            swap_functional: record.swap_functional.clone(),
            is_composite: record.is_composite,
            components: record.components.clone(),
            difficulty_weight: record.difficulty_weight,
            source: FlagSource::KnowledgeBase,
        }
    }
}

/// The pipeline's output for one submission.
///
/// Built once through the constructors below; there are no setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ClassificationResult {
    pub status: CheckStatus,
    pub flagged: Vec<FlaggedItem>,
    pub explanation: String,
    #[serde(default)]
    pub cached: bool,
}

impl ClassificationResult {
    pub fn new(status: CheckStatus, flagged: Vec<FlaggedItem>, explanation: String) -> Self {
        Self {
            status,
            flagged,
            explanation,
            cached: false,
        }
    }

    pub fn unclear(explanation: impl Into<String>) -> Self {
        Self::new(CheckStatus::Unclear, Vec::new(), explanation.into())
    }

    pub fn error(explanation: impl Into<String>) -> Self {
        Self::new(CheckStatus::Error, Vec::new(), explanation.into())
    }

    /// Copy of this result with the `cached` flag set.
    pub fn with_cached(self, cached: bool) -> Self {
        Self { cached, ..self }
    }
}

/// A persisted product memory row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub ingredient_text: String,
    pub status: CheckStatus,
    pub flagged: Vec<FlaggedItem>,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

impl MemoryEntry {
    pub fn new(ingredient_text: &str, result: &ClassificationResult) -> Self {
        Self {
            ingredient_text: ingredient_text.to_string(),
            status: result.status,
            flagged: result.flagged.clone(),
            explanation: result.explanation.clone(),
            created_at: Utc::now(),
        }
    }

    /// Rebuild the stored verdict, marked as served from memory.
    pub fn into_result(self) -> ClassificationResult {
        ClassificationResult::new(self.status, self.flagged, self.explanation).with_cached(true)
    }
}
