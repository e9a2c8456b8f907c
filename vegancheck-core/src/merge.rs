//! Merging of knowledge-base and oracle findings, and status resolution.

use std::collections::HashSet;

use crate::types::{CheckStatus, FlaggedItem, VeganStatus};

/// Appended to explanations when part of the list could not be verified.
pub const DEGRADED_NOTE: &str =
    "Some ingredients could not be verified, so this result may be incomplete.";

/// Concatenate the two lists and drop later items whose name was already seen.
///
/// Knowledge-base items come first, so they win over oracle items for the same name.
pub fn merge(kb_items: Vec<FlaggedItem>, oracle_items: Vec<FlaggedItem>) -> Vec<FlaggedItem> {
    let mut seen = HashSet::new();
    kb_items
        .into_iter()
        .chain(oracle_items)
        .filter(|item| seen.insert(item.name.clone()))
        .collect()
}

/// Resolve the overall status. `non_vegan` beats `maybe_vegan` beats `vegan`.
pub fn resolve_status(token_count: usize, merged: &[FlaggedItem]) -> CheckStatus {
    if token_count == 0 {
        CheckStatus::Unclear
    } else if merged
        .iter()
        .any(|i| i.vegan_status == VeganStatus::NonVegan)
    {
        CheckStatus::NonVegan
    } else if merged
        .iter()
        .any(|i| i.vegan_status == VeganStatus::MaybeVegan)
    {
        CheckStatus::MaybeVegan
    } else {
        CheckStatus::Vegan
    }
}

fn names_with(merged: &[FlaggedItem], status: VeganStatus) -> Vec<&str> {
    merged
        .iter()
        .filter(|i| i.vegan_status == status)
        .map(|i| i.name.as_str())
        .collect()
}

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("1 {}", one)
    } else {
        format!("{} {}", count, many)
    }
}

/// Human-readable summary for a resolved status.
pub fn explain(status: CheckStatus, merged: &[FlaggedItem], degraded: bool) -> String {
    let base = match status {
        CheckStatus::Vegan if degraded => {
            "No animal-derived ingredients were found among those that could be checked."
                .to_string()
        }
        CheckStatus::Vegan => "All detected ingredients are verified vegan.".to_string(),
        CheckStatus::NonVegan => {
            let names = names_with(merged, VeganStatus::NonVegan);
            let mut text = format!(
                "Found {}: {}.",
                plural(names.len(), "non-vegan item", "non-vegan items"),
                names.join(", ")
            );
            let maybe = names_with(merged, VeganStatus::MaybeVegan);
            if !maybe.is_empty() {
                text.push_str(&format!(" Also check: {}.", maybe.join(", ")));
            }
            text
        }
        CheckStatus::MaybeVegan => {
            let names = names_with(merged, VeganStatus::MaybeVegan);
            format!(
                "No definite animal ingredients, but {} may be animal-derived: {}.",
                plural(names.len(), "item", "items"),
                names.join(", ")
            )
        }
        CheckStatus::Unclear => "No ingredients could be recognized in the text.".to_string(),
        CheckStatus::Error => "Analysis failed. Please try again.".to_string(),
    };

    if degraded {
        format!("{} {}", base, DEGRADED_NOTE)
    } else {
        base
    }
}
