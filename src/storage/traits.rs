//! Abstract storage contract for the entity ledger.
//!
//! Collaborators (extraction jobs, dashboards, schedulers) hold an
//! `Arc<dyn EntityStore>` rather than a concrete backend, so tests can run
//! many isolated stores and a durable backend can slot in later.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::entity::{Entity, EntityId, ResolvedRelationship};
use crate::error::LedgerResult;
use crate::observation::{Observation, RawObservation};
use crate::query::EntityQuery;
use crate::stats::EntityStats;

/// Errors that can occur during storage operations.
///
/// None of these are expected in normal operation; an unknown id on lookup
/// is `Ok(None)`, not an error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A merge target vanished between matching and merging. Indicates an
    /// indexing bug.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// Storage trait for entity resolution.
///
/// # Atomicity
/// Duplicate detection and the resulting merge or insert happen as one unit
/// with respect to the record table and both indexes. Queries and stats see
/// a consistent snapshot.
pub trait EntityStore: Send + Sync {
    /// Record an observation. Merges into the first existing entity of the
    /// same type whose similarity reaches the threshold, otherwise creates a
    /// new entity. Returns the id of the entity that now holds the data.
    fn add(&self, observation: Observation) -> Result<EntityId, StorageError>;

    /// Look up an entity by id, counting the read.
    ///
    /// A hit increments `access_count` and refreshes `last_updated`.
    fn get(&self, id: EntityId) -> Result<Option<Entity>, StorageError>;

    /// Filter entities. Does not count as an access.
    fn query(&self, query: &EntityQuery) -> Result<Vec<Entity>, StorageError>;

    /// Entities that any run of `workflow` contributed to, oldest first.
    fn find_by_workflow(&self, workflow: &str) -> Result<Vec<Entity>, StorageError>;

    /// Resolve an entity's relationships to their targets.
    ///
    /// Returns `Ok(None)` if the entity itself is unknown. Does not count as
    /// an access on either side.
    fn related(&self, id: EntityId) -> Result<Option<Vec<ResolvedRelationship>>, StorageError>;

    /// Aggregate statistics.
    fn stats(&self) -> Result<EntityStats, StorageError>;

    /// Remove never-read entities last updated before `cutoff`.
    ///
    /// Returns the number removed. Entities with `access_count > 0` are kept
    /// regardless of age.
    fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError>;

    /// Remove never-read entities not updated in the last `retention_days`.
    ///
    /// A retention reaching past the earliest representable time removes
    /// nothing.
    fn cleanup(&self, retention_days: u32) -> Result<usize, StorageError> {
        self.cleanup_older_than(retention_cutoff(Utc::now(), retention_days))
    }

    /// Total number of entities.
    fn count(&self) -> Result<usize, StorageError>;

    /// Remove every entity and reset all indexes.
    fn clear(&self) -> Result<(), StorageError>;

    /// Validate an untyped observation and record it.
    ///
    /// # Errors
    /// - `LedgerError::Validation` for unknown types or relationship kinds,
    ///   missing or out-of-range confidence.
    /// - `LedgerError::Storage` if the backend fails.
    fn submit(&self, raw: RawObservation) -> LedgerResult<EntityId> {
        let observation = Observation::try_from(raw)?;
        Ok(self.add(observation)?)
    }
}

/// `now` minus `retention_days`, saturating at the earliest representable time.
pub(crate) fn retention_cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(retention_days))
        .and_then(|retention| now.checked_sub_signed(retention))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retention_cutoff() {
        let now = Utc::now();
        assert_eq!(retention_cutoff(now, 0), now);
        assert_eq!(retention_cutoff(now, 90), now - Duration::days(90));
        assert_eq!(retention_cutoff(now, u32::MAX), DateTime::<Utc>::MIN_UTC);
    }

    // Compile-time test: ensure the trait is object-safe
    fn _assert_entity_store_object_safe(_: &dyn EntityStore) {}

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::EntityNotFound(EntityId::new());
        assert!(err.to_string().contains("Entity not found"));

        let err = StorageError::BackendError("poisoned lock: entity.add".to_string());
        assert!(err.to_string().contains("poisoned lock"));
    }
}
