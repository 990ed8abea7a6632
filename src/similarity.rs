//! Similarity scoring and duplicate detection.
//!
//! An observation is compared field by field against existing entities of the
//! same type. The score is the share of fields (over the union of both
//! records' field names) that agree, where string fields may agree partially.
//!
//! The string measure is a cheap character-set approximation, not an edit
//! distance. It has known blind spots in both directions: "Bob Smith" and
//! "Robert Smith" share only 8 of 10 distinct characters (0.8) and stay
//! separate at the default threshold, while unrelated strings built from the
//! same letters score high. Dedup outcomes depend on this exact function.

use std::collections::HashSet;

use crate::entity::Entity;
use crate::observation::Observation;
use crate::value::{AttributeValue, Attributes};

/// Score for one string containing the other, ignoring case.
pub const SUBSTRING_SCORE: f64 = 0.8;

/// Case-insensitive fuzzy match of two strings in [0.0, 1.0].
///
/// Equal strings score 1.0, containment in either direction scores 0.8, and
/// anything else scores the Jaccard similarity of the two character sets.
///
/// ```
/// use entity_ledger::similarity::fuzzy_match;
///
/// assert_eq!(fuzzy_match("ACME", "acme"), 1.0);
/// assert_eq!(fuzzy_match("Acme Corp", "acme"), 0.8);
/// assert_eq!(fuzzy_match("abc", "abd"), 0.5);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fuzzy_match(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    if a == b {
        return 1.0;
    }
    if a.contains(b.as_str()) || b.contains(a.as_str()) {
        return SUBSTRING_SCORE;
    }

    let set_a: HashSet<char> = a.chars().collect();
    let set_b: HashSet<char> = b.chars().collect();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    intersection as f64 / union as f64
}

/// Agreement between two values of the same field.
///
/// Equal values score 1.0 whatever they hold, nulls and empty strings
/// included. Unequal strings fall back to [`fuzzy_match`]; any other unequal
/// pair scores 0.0.
#[must_use]
pub fn field_score(existing: &AttributeValue, incoming: &AttributeValue) -> f64 {
    if existing.same_as(incoming) {
        return 1.0;
    }
    match (existing.as_str(), incoming.as_str()) {
        (Some(a), Some(b)) => fuzzy_match(a, b),
        _ => 0.0,
    }
}

/// Similarity of two attribute maps in [0.0, 1.0].
///
/// Every field in the union counts towards the denominator; only fields
/// present in both maps can add to the numerator. Two empty maps score 0.0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn attribute_similarity(existing: &Attributes, incoming: &Attributes) -> f64 {
    let fields: HashSet<&String> = existing.keys().chain(incoming.keys()).collect();
    if fields.is_empty() {
        return 0.0;
    }

    let matches: f64 = fields
        .iter()
        .filter_map(|field| {
            let a = existing.get(*field)?;
            let b = incoming.get(*field)?;
            Some(field_score(a, b))
        })
        .sum();

    matches / fields.len() as f64
}

/// Similarity of an observation to an existing entity.
///
/// Entities of a different type always score 0.0.
#[must_use]
pub fn entity_similarity(entity: &Entity, observation: &Observation) -> f64 {
    if entity.entity_type != observation.entity_type {
        return 0.0;
    }
    attribute_similarity(&entity.attributes, &observation.attributes)
}

/// Finds the entity an observation duplicates.
///
/// Candidates are scanned in the order given and the **first** one scoring at
/// or above `threshold` wins, even if a later candidate would score higher.
/// Candidates of another type are never matched. Returns the match and its
/// score.
pub fn find_duplicate<'a, I>(
    candidates: I,
    observation: &Observation,
    threshold: f64,
) -> Option<(&'a Entity, f64)>
where
    I: IntoIterator<Item = &'a Entity>,
{
    // A zero threshold would otherwise accept a 0.0 score from another type.
    candidates
        .into_iter()
        .filter(|candidate| candidate.entity_type == observation.entity_type)
        .map(|candidate| {
            let score = attribute_similarity(&candidate.attributes, &observation.attributes);
            (candidate, score)
        })
        .find(|(_, score)| *score >= threshold)
}
