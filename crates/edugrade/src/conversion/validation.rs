use chrono::NaiveDate;

use super::domain::{ConversionRule, RuleDraft, RuleId};
use super::error::ConversionError;

/// Reject drafts that could never be selected or looked up.
pub(crate) fn validate_draft(draft: &RuleDraft) -> Result<(), ConversionError> {
    if draft.system.is_blank() {
        return Err(ConversionError::InvalidRule(
            "system must be a non-empty string".to_string(),
        ));
    }

    if !draft.grade_range.is_well_formed() {
        return Err(ConversionError::InvalidRule(format!(
            "grade range {} has min above max",
            draft.grade_range
        )));
    }

    if let Some(valid_to) = draft.valid_to {
        if valid_to <= draft.valid_from {
            return Err(ConversionError::InvalidRule(format!(
                "validTo {valid_to} must be after validFrom {}",
                draft.valid_from
            )));
        }
    }

    if draft.map.is_empty() {
        return Err(ConversionError::InvalidRule(
            "map must not be empty".to_string(),
        ));
    }

    for (source, target) in &draft.map {
        if source.trim().is_empty() || target.trim().is_empty() {
            return Err(ConversionError::InvalidRule(format!(
                "map entry '{source}' -> '{target}' has a blank token"
            )));
        }
        if source.trim() != source {
            return Err(ConversionError::InvalidRule(format!(
                "map key '{source}' has surrounding whitespace"
            )));
        }
    }

    Ok(())
}

/// What registering a draft does to the versions already stored for its tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RegistrationPlan {
    /// Version that gets closed at the draft's `valid_from`.
    pub(crate) supersedes: Option<Supersession>,
}

/// A version cut short by a new registration, with the end it had before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Supersession {
    pub(crate) rule: RuleId,
    pub(crate) previous_valid_to: Option<NaiveDate>,
}

/// Decide whether `draft` can be inserted next to `existing`.
///
/// Only rules with the draft's exact `(system, country scope, direction)` are
/// considered. A conflicting version is superseded when it covers the same
/// grade range, started strictly before the draft, and the draft runs at least
/// as long as it did. Any other overlap in both time and grade range is
/// rejected, so no date that had an answer loses it.
pub(crate) fn plan_registration(
    existing: &[ConversionRule],
    draft: &RuleDraft,
) -> Result<RegistrationPlan, ConversionError> {
    let mut supersedes: Option<&ConversionRule> = None;

    let conflicts = existing
        .iter()
        .filter(|rule| {
            rule.system == draft.system
                && rule.country == draft.country
                && rule.direction == draft.direction
        })
        .filter(|rule| rule.grade_range.overlaps(&draft.grade_range))
        .filter(|rule| rule.overlaps_period(draft.valid_from, draft.valid_to));

    for rule in conflicts {
        let replaceable = rule.grade_range == draft.grade_range
            && rule.valid_from < draft.valid_from
            && draft_outlasts(draft, rule);

        if !replaceable || supersedes.is_some() {
            return Err(overlap(draft, rule));
        }
        supersedes = Some(rule);
    }

    Ok(RegistrationPlan {
        supersedes: supersedes.map(|rule| Supersession {
            rule: rule.id.clone(),
            previous_valid_to: rule.valid_to,
        }),
    })
}

fn draft_outlasts(draft: &RuleDraft, existing: &ConversionRule) -> bool {
    match (existing.valid_to, draft.valid_to) {
        (None, _) | (Some(_), None) => true,
        (Some(existing_end), Some(draft_end)) => draft_end >= existing_end,
    }
}

fn overlap(draft: &RuleDraft, existing: &ConversionRule) -> ConversionError {
    ConversionError::OverlappingRuleVersion {
        system: draft.system.clone(),
        country: draft.country.clone(),
        direction: draft.direction,
        existing: existing.id.clone(),
    }
}
