//! Lookups and assertions against a parsed plan
//!
//! All lookups are exact string matches on the address. A near miss is never
//! resolved to a neighbouring address; it is only listed as a suggestion in the
//! error of the `require_*` forms.

use serde_json::Value;

use super::types::{Action, OutputChange, PlanModel, ResourceChange};
use crate::error::{HarnessError, Result, UsageError};

const MAX_SUGGESTIONS: usize = 3;

/// Whether the plan proposes any change record for `address`
pub fn resource_change_exists(model: &PlanModel, address: &str) -> bool {
    get_resource_change(model, address).is_some()
}

/// The change record for `address`, or `None` when the plan has none
pub fn get_resource_change<'a>(model: &'a PlanModel, address: &str) -> Option<&'a ResourceChange> {
    model.lookup(address)
}

/// The change record for `address`, failing with [`HarnessError::NotFound`]
pub fn require_resource_change<'a>(
    model: &'a PlanModel,
    address: &str,
) -> Result<&'a ResourceChange> {
    if address.is_empty() {
        return Err(UsageError::EmptyAddress.into());
    }

    get_resource_change(model, address).ok_or_else(|| HarnessError::NotFound {
        address: address.to_string(),
        suggestions: closest_addresses(model, address),
    })
}

/// Require that `address` exists and that its actions include `expected`.
///
/// `Action::Delete` and `Action::Create` both match a replacement.
pub fn require_action<'a>(
    model: &'a PlanModel,
    address: &str,
    expected: Action,
) -> Result<&'a ResourceChange> {
    let change = require_resource_change(model, address)?;
    if change.actions.contains(expected) {
        Ok(change)
    } else {
        Err(HarnessError::ActionMismatch {
            address: address.to_string(),
            expected,
            actual: change.actions.clone(),
        })
    }
}

/// Whether `address` appears among the planned resource values
pub fn planned_value_exists(model: &PlanModel, address: &str) -> bool {
    model.planned_values().contains_key(address)
}

pub fn get_planned_values<'a>(model: &'a PlanModel, address: &str) -> Option<&'a Value> {
    model.planned_values().get(address)
}

pub fn get_output_change<'a>(model: &'a PlanModel, name: &str) -> Option<&'a OutputChange> {
    model.output_changes().get(name)
}

/// Known addresses sharing the longest common prefix with `address`
fn closest_addresses(model: &PlanModel, address: &str) -> Vec<String> {
    let mut scored: Vec<(usize, &str)> = model
        .addresses()
        .map(|candidate| (common_prefix_len(candidate, address), candidate))
        .filter(|(score, _)| *score > 0)
        .collect();

    // Highest score first, then alphabetical for stable output
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

    let best = match scored.first() {
        Some((score, _)) => *score,
        None => return Vec::new(),
    };

    scored
        .into_iter()
        .take_while(|(score, _)| *score == best)
        .take(MAX_SUGGESTIONS)
        .map(|(_, candidate)| candidate.to_string())
        .collect()
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}
