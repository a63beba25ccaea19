use chrono::NaiveDate;

use super::domain::{ConversionRule, RuleCriteria};

/// Result of narrowing a candidate set down to the rule a request should use.
#[derive(Debug, PartialEq)]
pub(crate) enum Selection<'a> {
    Selected(&'a ConversionRule),
    NoMatch,
    Ambiguous(Vec<&'a ConversionRule>),
}

/// Pick the single rule answering `criteria` on `as_of`.
///
/// Candidates are filtered by system, direction, and country scope, then by
/// grade-range containment and validity on `as_of`. Exact-country rules
/// shadow wildcard rules that survive the same filters.
pub(crate) fn select_rule<'a>(
    candidates: &'a [ConversionRule],
    criteria: &RuleCriteria,
    as_of: NaiveDate,
) -> Selection<'a> {
    let applicable: Vec<&ConversionRule> = candidates
        .iter()
        .filter(|rule| rule.system == criteria.system && rule.direction == criteria.direction)
        .filter(|rule| rule.country.serves(&criteria.country))
        .filter(|rule| rule.grade_range.contains(criteria.level_stage))
        .filter(|rule| rule.is_valid_on(as_of))
        .collect();

    narrow_by_specificity(applicable)
}

/// Open-ended rules covering the level, ignoring dates. Used when closing or
/// inspecting the current version of a tuple.
pub(crate) fn select_current<'a>(
    candidates: &'a [ConversionRule],
    criteria: &RuleCriteria,
) -> Selection<'a> {
    let applicable: Vec<&ConversionRule> = candidates
        .iter()
        .filter(|rule| rule.system == criteria.system && rule.direction == criteria.direction)
        .filter(|rule| rule.country.serves(&criteria.country))
        .filter(|rule| rule.grade_range.contains(criteria.level_stage))
        .filter(|rule| rule.is_open_ended())
        .collect();

    narrow_by_specificity(applicable)
}

fn narrow_by_specificity(applicable: Vec<&ConversionRule>) -> Selection<'_> {
    let has_exact = applicable.iter().any(|rule| rule.country.is_exact());
    let mut remaining: Vec<&ConversionRule> = applicable
        .into_iter()
        .filter(|rule| !has_exact || rule.country.is_exact())
        .collect();

    match remaining.len() {
        0 => Selection::NoMatch,
        1 => Selection::Selected(remaining.remove(0)),
        _ => {
            remaining.sort_by(|a, b| a.id.cmp(&b.id));
            Selection::Ambiguous(remaining)
        }
    }
}
