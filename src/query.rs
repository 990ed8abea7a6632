//! Entity queries.
//!
//! A query narrows candidates by type through the type index (or scans the
//! whole table), then filters in memory by attributes, tags and confidence,
//! and finally truncates. Queries never count as an access.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityType};
use crate::value::{AttributeValue, Attributes};

/// Filters for [`crate::EntityStore::query`]. All filters are optional and
/// combine with AND.
///
/// # Example
/// ```
/// use entity_ledger::{EntityQuery, EntityType};
///
/// let query = EntityQuery::new()
///     .entity_type(EntityType::Company)
///     .min_confidence(0.5)
///     .limit(2);
/// assert_eq!(query.limit, Some(2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityQuery {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,

    /// Every listed field must be present and exactly equal.
    pub attributes: Attributes,

    /// The entity must carry at least one of these tags. Empty means no
    /// tag filter.
    pub tags: BTreeSet<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,

    /// Maximum number of results. Zero means unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl EntityQuery {
    /// Creates an empty query matching every entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    /// Require an attribute to equal `value`.
    #[must_use]
    pub fn attribute(mut self, field: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    /// Accept entities carrying `tag` (any listed tag suffices).
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    #[must_use]
    pub const fn min_confidence(mut self, min: f64) -> Self {
        self.min_confidence = Some(min);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches_attributes(&self, entity: &Entity) -> bool {
        self.attributes.iter().all(|(field, expected)| {
            entity
                .attributes
                .get(field)
                .is_some_and(|actual| actual.same_as(expected))
        })
    }

    fn matches_tags(&self, entity: &Entity) -> bool {
        self.tags.is_empty() || entity.has_any_tag(&self.tags)
    }

    fn matches_confidence(&self, entity: &Entity) -> bool {
        self.min_confidence
            .map_or(true, |min| entity.confidence_score >= min)
    }

    /// Returns true if `entity` passes every filter except the limit.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        self.entity_type.map_or(true, |t| entity.entity_type == t)
            && self.matches_attributes(entity)
            && self.matches_tags(entity)
            && self.matches_confidence(entity)
    }

    /// Applies the in-memory filters and the limit to pre-narrowed
    /// candidates, preserving their order.
    pub fn apply<'a, I>(&self, candidates: I) -> Vec<Entity>
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        let filtered = candidates.into_iter().filter(|e| self.matches(e));
        match self.limit {
            Some(limit) if limit > 0 => filtered.take(limit).cloned().collect(),
            _ => filtered.cloned().collect(),
        }
    }
}
