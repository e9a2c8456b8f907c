//! Validation of oracle responses.
//!
//! The oracle's output is untrusted text. It is parsed into [`OracleResponse`]
//! and checked before anything downstream sees it.

use serde::Deserialize;

use super::OracleError;
use crate::types::{FlagSource, FlaggedItem, VeganStatus};

const UNCLEAR_FALLBACK: &str = "The ingredient list could not be understood.";

/// Response format expected from the oracle.
#[derive(Debug, Deserialize)]
struct OracleResponse {
    is_vegan: Option<bool>,
    #[serde(default)]
    maybe: Option<bool>,
    #[serde(default)]
    unclear: Option<bool>,
    #[serde(default)]
    flagged: Vec<OracleItem>,
    explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OracleItem {
    name: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    function: Option<String>,
    #[serde(default)]
    nourishment: Option<String>,
}

/// A validated oracle answer.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleVerdict {
    /// The oracle classified the ingredients. `flagged` is empty when all are vegan.
    Classified {
        flagged: Vec<FlaggedItem>,
        explanation: String,
    },
    /// The oracle could not make sense of the input.
    Unintelligible { explanation: String },
}

impl OracleVerdict {
    pub fn flagged(&self) -> &[FlaggedItem] {
        match self {
            OracleVerdict::Classified { flagged, .. } => flagged,
            OracleVerdict::Unintelligible { .. } => &[],
        }
    }
}

/// Strip a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().trim_end_matches("```").trim()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse and validate raw oracle output.
pub fn parse_oracle_response(text: &str) -> Result<OracleVerdict, OracleError> {
    let json = strip_code_fence(text);
    if json.is_empty() {
        return Err(OracleError::EmptyResponse);
    }

    let response: OracleResponse =
        serde_json::from_str(json).map_err(|e| OracleError::Schema(e.to_string()))?;

    if response.unclear == Some(true) {
        return Ok(OracleVerdict::Unintelligible {
            explanation: non_empty(response.explanation)
                .unwrap_or_else(|| UNCLEAR_FALLBACK.to_string()),
        });
    }

    let is_vegan = response
        .is_vegan
        .ok_or_else(|| OracleError::Schema("missing field `is_vegan`".to_string()))?;
    let explanation = non_empty(response.explanation)
        .ok_or_else(|| OracleError::Schema("missing field `explanation`".to_string()))?;

    // Items flagged alongside is_vegan=true are treated as uncertain.
    let status = if response.maybe == Some(true) || is_vegan {
        VeganStatus::MaybeVegan
    } else {
        VeganStatus::NonVegan
    };

    let flagged = response
        .flagged
        .into_iter()
        .filter_map(|item| {
            let name = item.name.trim().to_lowercase();
            if name.is_empty() {
                return None;
            }
            Some(FlaggedItem {
                name,
                vegan_status: status,
                function_logic: non_empty(item.function),
                nourishment_fact: non_empty(item.nourishment),
                sub_reasoning: non_empty(item.reason),
                swap_static: None,
                swap_functional: None,
                is_composite: false,
                components: vec![],
                difficulty_weight: None,
                source: FlagSource::Oracle,
            })
        })
        .collect();

    Ok(OracleVerdict::Classified {
        flagged,
        explanation,
    })
}
