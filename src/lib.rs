//! # entity-ledger - entity resolution for extracted facts
//!
//! Extraction jobs (document parsers, browser recorders, scrapers) report
//! what they saw as observations. The ledger decides whether each
//! observation describes an entity it already knows and either folds it into
//! that entity or creates a new one, so repeated sightings of the same
//! person, company, email, URL, document or form submission end up as one
//! canonical record.
//!
//! ## Core Concepts
//!
//! - **Entity**: the canonical record, with attributes, relationships by id,
//!   contributing workflows, tags and a confidence score
//! - **Observation**: one validated report about an entity
//! - **Deduplication**: a same-type, first-above-threshold similarity match
//! - **Retention**: never-read entities expire after a configurable age
//!
//! ## Usage
//!
//! ```rust
//! use entity_ledger::{EntityQuery, EntityStore, EntityType, InMemoryEntityStore, Observation};
//!
//! let store = InMemoryEntityStore::new();
//!
//! let id = store.add(
//!     Observation::builder(EntityType::Company)
//!         .attribute("name", "Acme Corp")
//!         .source_workflow("wf-invoice-scan")
//!         .confidence(0.9)
//!         .build()?,
//! )?;
//!
//! let companies = store.query(&EntityQuery::new().entity_type(EntityType::Company))?;
//! assert_eq!(companies[0].id, id);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod entity;
pub mod error;
pub mod merge;
pub mod observation;
pub mod query;
pub mod similarity;
pub mod stats;
pub mod storage;
pub mod sweeper;
pub mod value;

// Re-export primary types at crate root for convenience
pub use config::StoreConfig;
pub use entity::{Entity, EntityId, EntityType, Relationship, RelationshipKind, ResolvedRelationship};
pub use error::{LedgerError, LedgerResult, ValidationError};
pub use observation::{Observation, ObservationBuilder, RawObservation, RawRelationship};
pub use query::EntityQuery;
pub use stats::EntityStats;
pub use storage::{EntityStore, InMemoryEntityStore, StorageError};
pub use sweeper::{RetentionSweeper, SweeperConfig};
pub use value::{AttributeValue, Attributes};
