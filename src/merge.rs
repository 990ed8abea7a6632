//! Folding duplicate observations into existing entities.
//!
//! A merge never deletes information: attributes are overlaid, relationships,
//! workflows and tags only grow.

use chrono::{DateTime, Utc};

use crate::entity::Entity;
use crate::observation::Observation;

/// Merge `observation` into `target` in place.
///
/// - Attributes: fields in the observation overwrite; others are kept.
/// - Relationships: appended unless one already points at the same entity,
///   whatever its kind.
/// - Workflows and tags: set union.
/// - Confidence: mean of the current and observed scores.
/// - `last_updated` is set to `now`; `access_count` is untouched.
pub fn merge_observation(target: &mut Entity, observation: Observation, now: DateTime<Utc>) {
    let Observation {
        attributes,
        relationships,
        source_workflows,
        confidence_score,
        tags,
        ..
    } = observation;

    target.attributes.extend(attributes);

    for relationship in relationships {
        if !target.relates_to(relationship.entity_id) {
            target.relationships.push(relationship);
        }
    }

    target.source_workflows.extend(source_workflows);
    target.confidence_score = mean_confidence(target.confidence_score, confidence_score);
    target.tags.extend(tags);
    target.last_updated = now;
}

/// Arithmetic mean of two scores, clamped to [0.0, 1.0].
#[must_use]
pub fn mean_confidence(current: f64, observed: f64) -> f64 {
    ((current + observed) / 2.0).clamp(0.0, 1.0)
}
