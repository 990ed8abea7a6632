//! Observations: incoming reports about an entity.
//!
//! Extraction jobs describe what they saw with an [`Observation`]. It has no
//! id, timestamps or access count; the store assigns those. Observations are
//! validated when they are built, so the store never re-checks them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityType, Relationship, RelationshipKind};
use crate::error::ValidationError;
use crate::value::{AttributeValue, Attributes};

/// A validated report about one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub(crate) entity_type: EntityType,
    pub(crate) attributes: Attributes,
    pub(crate) relationships: Vec<Relationship>,
    pub(crate) source_workflows: BTreeSet<String>,
    pub(crate) confidence_score: f64,
    pub(crate) tags: BTreeSet<String>,
}

impl Observation {
    /// Starts a builder for an observation of the given type.
    #[must_use]
    pub fn builder(entity_type: EntityType) -> ObservationBuilder {
        ObservationBuilder::new(entity_type)
    }

    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    #[must_use]
    pub const fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    #[must_use]
    pub const fn source_workflows(&self) -> &BTreeSet<String> {
        &self.source_workflows
    }

    #[must_use]
    pub const fn confidence_score(&self) -> f64 {
        self.confidence_score
    }

    #[must_use]
    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }
}

/// Validates a confidence score.
///
/// # Errors
///
/// Returns `ValidationError::ConfidenceOutOfRange` for NaN or values outside
/// [0.0, 1.0].
pub fn validate_confidence(value: f64) -> Result<f64, ValidationError> {
    if value.is_nan() || !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::ConfidenceOutOfRange { value });
    }
    Ok(value)
}

fn non_empty(field: &str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField {
            field: field.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Builder for [`Observation`].
///
/// # Example
/// ```
/// use entity_ledger::{EntityType, Observation};
///
/// let obs = Observation::builder(EntityType::Email)
///     .attribute("address", "a@x.com")
///     .source_workflow("wf-inbox-scan")
///     .confidence(0.9)
///     .tag("lead")
///     .build()
///     .unwrap();
/// assert_eq!(obs.confidence_score(), 0.9);
/// ```
#[derive(Debug, Clone)]
pub struct ObservationBuilder {
    entity_type: EntityType,
    attributes: Attributes,
    relationships: Vec<Relationship>,
    source_workflows: Vec<String>,
    confidence: Option<f64>,
    tags: Vec<String>,
}

impl ObservationBuilder {
    /// Creates a builder for the given entity type.
    #[must_use]
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            attributes: Attributes::new(),
            relationships: Vec::new(),
            source_workflows: Vec::new(),
            confidence: None,
            tags: Vec::new(),
        }
    }

    /// Set one attribute; later calls for the same field win.
    #[must_use]
    pub fn attribute(mut self, field: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    /// Set several attributes at once.
    #[must_use]
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Add a relationship to another entity.
    #[must_use]
    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Shorthand for a relationship without metadata.
    #[must_use]
    pub fn related(self, entity_id: EntityId, kind: RelationshipKind) -> Self {
        self.relationship(Relationship::new(entity_id, kind))
    }

    /// Record the workflow run that produced this observation.
    #[must_use]
    pub fn source_workflow(mut self, workflow: impl Into<String>) -> Self {
        self.source_workflows.push(workflow.into());
        self
    }

    /// Set the confidence in this observation (required).
    #[must_use]
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Build the observation.
    ///
    /// # Errors
    ///
    /// - `MissingField` if no confidence was set.
    /// - `ConfidenceOutOfRange` if the confidence is NaN or outside [0.0, 1.0].
    /// - `EmptyField` if a workflow id or tag is blank.
    pub fn build(self) -> Result<Observation, ValidationError> {
        let confidence = self.confidence.ok_or_else(|| ValidationError::MissingField {
            field: "confidence_score".to_string(),
        })?;
        let confidence_score = validate_confidence(confidence)?;

        let source_workflows = self
            .source_workflows
            .into_iter()
            .map(|w| non_empty("source_workflow", w))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let tags = self
            .tags
            .into_iter()
            .map(|t| non_empty("tag", t))
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Observation {
            entity_type: self.entity_type,
            attributes: self.attributes,
            relationships: self.relationships,
            source_workflows,
            confidence_score,
            tags,
        })
    }
}

/// Untyped relationship as reported by an extraction job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRelationship {
    pub entity_id: EntityId,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Untyped observation as it arrives from an extraction job.
///
/// Converting it into an [`Observation`] is the boundary validation step:
/// unknown types and out-of-range confidence are rejected here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    #[serde(rename = "type")]
    pub entity_type: String,

    #[serde(default)]
    pub attributes: Attributes,

    #[serde(default)]
    pub relationships: Vec<RawRelationship>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_workflow: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl TryFrom<RawObservation> for Observation {
    type Error = ValidationError;

    fn try_from(raw: RawObservation) -> Result<Self, Self::Error> {
        let entity_type: EntityType = raw.entity_type.parse()?;

        let mut builder = ObservationBuilder::new(entity_type).attributes(raw.attributes);
        for rel in raw.relationships {
            let kind: RelationshipKind = rel.kind.parse()?;
            builder = builder.relationship(Relationship {
                entity_id: rel.entity_id,
                kind,
                metadata: rel.metadata,
            });
        }
        if let Some(workflow) = raw.source_workflow {
            builder = builder.source_workflow(workflow);
        }
        if let Some(confidence) = raw.confidence_score {
            builder = builder.confidence(confidence);
        }
        for tag in raw.tags {
            builder = builder.tag(tag);
        }
        builder.build()
    }
}
