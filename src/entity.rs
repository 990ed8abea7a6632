//! Entity types and identity management.
//!
//! An [`Entity`] is the canonical record for one real-world person, company,
//! email address, URL, document or form submission. Repeated observations of
//! the same thing are folded into a single entity by the store.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::value::Attributes;

/// Globally unique, stable entity identifier.
///
/// Assigned once when the store creates an entity and never reused for the
/// lifetime of the store.
///
/// # Examples
///
/// ```
/// use entity_ledger::EntityId;
///
/// let id = EntityId::new();
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entity ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Creates a nil entity ID (for testing or sentinel values).
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<EntityId> for Uuid {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Closed classification of entity types.
///
/// An entity never changes type, and deduplication never compares across
/// types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A human person
    Person,
    /// A company or organization
    Company,
    /// An email address
    Email,
    /// A web URL
    Url,
    /// A parsed document (PDF, spreadsheet, ...)
    Document,
    /// A captured form submission
    FormData,
}

impl EntityType {
    /// Every entity type, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Person,
        Self::Company,
        Self::Email,
        Self::Url,
        Self::Document,
        Self::FormData,
    ];

    /// Returns the wire name of this type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Company => "company",
            Self::Email => "email",
            Self::Url => "url",
            Self::Document => "document",
            Self::FormData => "form_data",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == key)
            .ok_or_else(|| ValidationError::UnknownEntityType {
                value: s.to_string(),
            })
    }
}

/// Kind of link between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Person employed by a company
    WorksAt,
    /// Person reached via an email or form
    Contacted,
    /// Visit to a URL
    Visited,
    /// Fact pulled out of a document or page
    ExtractedFrom,
    /// Anything else
    RelatedTo,
}

impl RelationshipKind {
    /// Every relationship kind, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::WorksAt,
        Self::Contacted,
        Self::Visited,
        Self::ExtractedFrom,
        Self::RelatedTo,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WorksAt => "works_at",
            Self::Contacted => "contacted",
            Self::Visited => "visited",
            Self::ExtractedFrom => "extracted_from",
            Self::RelatedTo => "related_to",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| ValidationError::UnknownRelationshipKind {
                value: s.to_string(),
            })
    }
}

/// A link from one entity to another, by id only.
///
/// The store never follows these links on deletion; a target may disappear
/// and leave the link dangling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// The entity this link points at.
    pub entity_id: EntityId,

    #[serde(rename = "type")]
    pub kind: RelationshipKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Relationship {
    /// Creates a relationship without metadata.
    #[must_use]
    pub const fn new(entity_id: EntityId, kind: RelationshipKind) -> Self {
        Self {
            entity_id,
            kind,
            metadata: None,
        }
    }

    /// Attaches metadata to the relationship.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A relationship paired with its target, if the target still exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRelationship {
    pub relationship: Relationship,

    /// `None` when the target has been swept or cleared; dangling links are
    /// expected, not an error.
    pub target: Option<Entity>,
}

/// The canonical, deduplicated record for one real-world thing.
///
/// Entities are created and mutated only by the store; callers receive
/// snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Globally unique identifier
    pub id: EntityId,

    #[serde(rename = "type")]
    pub entity_type: EntityType,

    #[serde(default)]
    pub attributes: Attributes,

    #[serde(default)]
    pub relationships: Vec<Relationship>,

    #[serde(default)]
    pub source_workflows: BTreeSet<String>,

    /// Belief that this record is a correctly deduplicated, accurate entity.
    pub confidence_score: f64,

    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,

    /// Number of explicit lookups by id.
    pub access_count: u64,

    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Entity {
    /// Returns true if any relationship points at `target`.
    #[must_use]
    pub fn relates_to(&self, target: EntityId) -> bool {
        self.relationships.iter().any(|r| r.entity_id == target)
    }

    /// Returns true if the entity carries at least one of `tags`.
    #[must_use]
    pub fn has_any_tag<'a>(&self, tags: impl IntoIterator<Item = &'a String>) -> bool {
        tags.into_iter().any(|t| self.tags.contains(t))
    }

    /// Records an explicit read.
    pub(crate) fn record_access(&mut self, now: DateTime<Utc>) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_updated = now;
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Entity {}

impl std::hash::Hash for Entity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entity() -> Entity {
        let now = Utc::now();
        Entity {
            id: EntityId::new(),
            entity_type: EntityType::Email,
            attributes: Attributes::new(),
            relationships: Vec::new(),
            source_workflows: BTreeSet::new(),
            confidence_score: 0.5,
            first_seen: now,
            last_updated: now,
            access_count: 0,
            tags: BTreeSet::new(),
        }
    }

    #[test]
    fn test_entity_id_creation() {
        let id1 = EntityId::new();
        let id2 = EntityId::new();
        assert_ne!(id1, id2);
        assert!(!id1.is_nil());
    }

    #[test]
    fn test_entity_id_nil() {
        assert!(EntityId::nil().is_nil());
    }

    #[test]
    fn test_entity_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = EntityId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), &uuid);
    }

    #[test]
    fn test_entity_type_parse() {
        assert_eq!("person".parse::<EntityType>().unwrap(), EntityType::Person);
        assert_eq!("form_data".parse::<EntityType>().unwrap(), EntityType::FormData);
        assert_eq!(" url ".parse::<EntityType>().unwrap(), EntityType::Url);
    }

    #[test]
    fn test_entity_type_parse_unknown() {
        let err = "planet".parse::<EntityType>().unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownEntityType {
                value: "planet".to_string()
            }
        );
        // Wire names are case sensitive.
        assert!("Person".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_entity_type_display_matches_serde() {
        for t in EntityType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{t}\""));
        }
    }

    #[test]
    fn test_relationship_kind_parse() {
        assert_eq!(
            "extracted_from".parse::<RelationshipKind>().unwrap(),
            RelationshipKind::ExtractedFrom
        );
        assert!("owns".parse::<RelationshipKind>().is_err());
    }

    #[test]
    fn test_relationship_serialization() {
        let target = EntityId::new();
        let rel = Relationship::new(target, RelationshipKind::WorksAt)
            .with_metadata(serde_json::json!({"since": 2021}));
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["type"], "works_at");
        assert_eq!(json["metadata"]["since"], 2021);

        let back: Relationship = serde_json::from_value(json).unwrap();
        assert_eq!(back, rel);
    }

    #[test]
    fn test_entity_record_access() {
        let mut entity = sample_entity();
        let later = entity.last_updated + chrono::Duration::seconds(5);
        entity.record_access(later);
        entity.record_access(later);
        assert_eq!(entity.access_count, 2);
        assert_eq!(entity.last_updated, later);
        assert!(entity.first_seen < entity.last_updated);
    }

    #[test]
    fn test_entity_relates_to() {
        let mut entity = sample_entity();
        let target = EntityId::new();
        assert!(!entity.relates_to(target));
        entity
            .relationships
            .push(Relationship::new(target, RelationshipKind::Contacted));
        assert!(entity.relates_to(target));
    }

    #[test]
    fn test_entity_equality_is_by_id() {
        let a = sample_entity();
        let mut b = a.clone();
        b.confidence_score = 0.1;
        assert_eq!(a, b);
        assert_ne!(a, sample_entity());
    }

    #[test]
    fn test_entity_serialization() {
        let mut entity = sample_entity();
        entity.tags.insert("lead".to_string());
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["type"], "email");
        let back: Entity = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, entity.id);
        assert!(back.tags.contains("lead"));
    }
}
