//! In-memory storage backend.
//!
//! The record table and both secondary indexes live behind a single
//! `RwLock`. Every mutating call (`add`, `get`, `cleanup`, `clear`) takes the
//! write lock for its whole duration, so a dedup decision and the merge or
//! insert it leads to are one atomic step. Read-only calls share the lock.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::config::StoreConfig;
use crate::entity::{Entity, EntityId, EntityType, ResolvedRelationship};
use crate::error::ValidationError;
use crate::merge::merge_observation;
use crate::observation::Observation;
use crate::query::EntityQuery;
use crate::similarity::find_duplicate;
use crate::stats::EntityStats;
use crate::storage::index::{OrderedIdSet, TypeIndex, WorkflowIndex};
use crate::storage::traits::{EntityStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<EntityId, Entity>,
    /// Table insertion order, used for unfiltered scans.
    order: OrderedIdSet,
    by_type: TypeIndex,
    by_workflow: WorkflowIndex,
}

impl StoreState {
    fn resolve<'a>(&'a self, ids: &'a OrderedIdSet) -> impl Iterator<Item = &'a Entity> + 'a {
        ids.iter().filter_map(|id| self.records.get(id))
    }

    fn all(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.resolve(&self.order)
    }

    fn of_type(&self, entity_type: EntityType) -> Box<dyn Iterator<Item = &Entity> + '_> {
        match self.by_type.get(&entity_type) {
            Some(ids) => Box::new(self.resolve(ids)),
            None => Box::new(std::iter::empty()),
        }
    }

    fn insert(&mut self, entity: Entity) {
        let id = entity.id;
        self.order.insert(id);
        self.by_type.insert(entity.entity_type, id);
        for workflow in &entity.source_workflows {
            self.by_workflow.insert(workflow.clone(), id);
        }
        self.records.insert(id, entity);
    }

    fn merge(
        &mut self,
        id: EntityId,
        observation: Observation,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let Self {
            records,
            by_type,
            by_workflow,
            ..
        } = self;

        let Some(target) = records.get_mut(&id) else {
            error!(entity_id = %id, "merge target missing from record table");
            return Err(StorageError::EntityNotFound(id));
        };

        merge_observation(target, observation, now);

        by_type.insert(target.entity_type, id);
        for workflow in &target.source_workflows {
            by_workflow.insert(workflow.clone(), id);
        }
        Ok(())
    }

    fn remove_all(&mut self, ids: &HashSet<EntityId>) {
        for id in ids {
            self.records.remove(id);
        }
        self.order.remove_all(ids);
        self.by_type.remove_all(ids);
        self.by_workflow.remove_all(ids);
    }

    fn check_integrity(&self) -> Result<(), String> {
        if self.order.len() != self.records.len() {
            return Err(format!(
                "table order tracks {} ids but table holds {}",
                self.order.len(),
                self.records.len()
            ));
        }

        for (entity_type, ids) in self.by_type.buckets() {
            for id in ids.iter() {
                let entity = self
                    .records
                    .get(id)
                    .ok_or_else(|| format!("type index lists unknown entity {id}"))?;
                if entity.entity_type != *entity_type {
                    return Err(format!(
                        "entity {id} of type {} indexed under {entity_type}",
                        entity.entity_type
                    ));
                }
            }
        }

        for (workflow, ids) in self.by_workflow.buckets() {
            for id in ids.iter() {
                let entity = self
                    .records
                    .get(id)
                    .ok_or_else(|| format!("workflow index lists unknown entity {id}"))?;
                if !entity.source_workflows.contains(workflow) {
                    return Err(format!(
                        "entity {id} indexed under workflow {workflow} it does not list"
                    ));
                }
            }
        }

        for (id, entity) in &self.records {
            if !self.order.contains(id) {
                return Err(format!("entity {id} missing from table order"));
            }
            let typed = self
                .by_type
                .get(&entity.entity_type)
                .is_some_and(|ids| ids.contains(id));
            if !typed {
                return Err(format!("entity {id} missing from type index"));
            }
            for workflow in &entity.source_workflows {
                let indexed = self
                    .by_workflow
                    .get(workflow.as_str())
                    .is_some_and(|ids| ids.contains(id));
                if !indexed {
                    return Err(format!(
                        "entity {id} missing from workflow index under {workflow}"
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Thread-safe in-memory entity store.
///
/// Construct one per logical store and share it by reference (typically
/// `Arc<InMemoryEntityStore>` or `Arc<dyn EntityStore>`). Dropping it
/// discards every entity.
///
/// # Examples
///
/// ```
/// use entity_ledger::{EntityStore, EntityType, InMemoryEntityStore, Observation};
///
/// let store = InMemoryEntityStore::new();
/// let obs = || {
///     Observation::builder(EntityType::Email)
///         .attribute("address", "a@x.com")
///         .confidence(0.9)
///         .build()
///         .unwrap()
/// };
/// let first = store.add(obs()).unwrap();
/// let second = store.add(obs()).unwrap();
/// assert_eq!(first, second);
/// assert_eq!(store.count().unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    config: StoreConfig,
    state: RwLock<StoreState>,
}

impl InMemoryEntityStore {
    /// Create a new empty store with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the first problem reported by [`StoreConfig::validate`].
    pub fn with_config(config: StoreConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            config,
            state: RwLock::default(),
        })
    }

    /// The configuration this store was built with.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Run `cleanup` with the configured default retention.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BackendError` if the store lock is poisoned.
    pub fn cleanup_default(&self) -> Result<usize, StorageError> {
        self.cleanup(self.config.default_retention_days)
    }

    /// Verify the record table and both indexes agree.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BackendError` describing the first
    /// inconsistency found, or if the lock is poisoned.
    pub fn check_integrity(&self) -> Result<(), StorageError> {
        let state = self.state.read().map_err(|_| lock_err("entity.check_integrity"))?;
        state.check_integrity().map_err(StorageError::BackendError)
    }
}

impl EntityStore for InMemoryEntityStore {
    fn add(&self, observation: Observation) -> Result<EntityId, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("entity.add"))?;
        let now = Utc::now();

        let duplicate = find_duplicate(
            state.of_type(observation.entity_type),
            &observation,
            self.config.dedup_threshold,
        )
        .map(|(entity, score)| (entity.id, score));

        if let Some((id, score)) = duplicate {
            state.merge(id, observation, now)?;
            debug!(entity_id = %id, similarity = score, "merged observation into existing entity");
            return Ok(id);
        }

        let Observation {
            entity_type,
            attributes,
            relationships,
            source_workflows,
            confidence_score,
            tags,
        } = observation;

        let entity = Entity {
            id: EntityId::new(),
            entity_type,
            attributes,
            relationships,
            source_workflows,
            confidence_score,
            first_seen: now,
            last_updated: now,
            access_count: 0,
            tags,
        };
        let id = entity.id;
        state.insert(entity);
        debug!(entity_id = %id, entity_type = %entity_type, "created entity");
        Ok(id)
    }

    fn get(&self, id: EntityId) -> Result<Option<Entity>, StorageError> {
        // The access bump needs the write lock, so lookups queue behind writers
        // and the snapshot clone (attributes included) happens under it.
        let mut state = self.state.write().map_err(|_| lock_err("entity.get"))?;
        Ok(state.records.get_mut(&id).map(|entity| {
            entity.record_access(Utc::now());
            entity.clone()
        }))
    }

    fn query(&self, query: &EntityQuery) -> Result<Vec<Entity>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("entity.query"))?;
        let results = match query.entity_type {
            Some(entity_type) => query.apply(state.of_type(entity_type)),
            None => query.apply(state.all()),
        };
        Ok(results)
    }

    fn find_by_workflow(&self, workflow: &str) -> Result<Vec<Entity>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("entity.find_by_workflow"))?;
        let Some(ids) = state.by_workflow.get(workflow) else {
            return Ok(Vec::new());
        };
        Ok(state.resolve(ids).cloned().collect())
    }

    fn related(&self, id: EntityId) -> Result<Option<Vec<ResolvedRelationship>>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("entity.related"))?;
        let Some(entity) = state.records.get(&id) else {
            return Ok(None);
        };
        let resolved = entity
            .relationships
            .iter()
            .map(|relationship| ResolvedRelationship {
                relationship: relationship.clone(),
                target: state.records.get(&relationship.entity_id).cloned(),
            })
            .collect();
        Ok(Some(resolved))
    }

    fn stats(&self) -> Result<EntityStats, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("entity.stats"))?;
        Ok(EntityStats::collect(
            state.all(),
            Utc::now(),
            self.config.recent_window(),
        ))
    }

    fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("entity.cleanup"))?;
        let expired: HashSet<EntityId> = state
            .all()
            .filter(|entity| entity.last_updated < cutoff && entity.access_count == 0)
            .map(|entity| entity.id)
            .collect();

        state.remove_all(&expired);
        if !expired.is_empty() {
            info!(removed = expired.len(), cutoff = %cutoff, "swept stale entities");
        }
        Ok(expired.len())
    }

    fn count(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("entity.count"))?;
        Ok(state.records.len())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("entity.clear"))?;
        let removed = state.records.len();
        *state = StoreState::default();
        info!(removed, "cleared entity store");
        Ok(())
    }
}

#[cfg(test)]
impl InMemoryEntityStore {
    /// Shift an entity's `last_updated` into the past.
    fn backdate(&self, id: EntityId, by: chrono::Duration) {
        let mut state = self.state.write().unwrap();
        let entity = state.records.get_mut(&id).unwrap();
        entity.last_updated = entity.last_updated - by;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::entity::{Relationship, RelationshipKind};
    use crate::value::AttributeValue;

    fn email(address: &str, confidence: f64) -> Observation {
        Observation::builder(EntityType::Email)
            .attribute("address", address)
            .confidence(confidence)
            .build()
            .unwrap()
    }

    #[test]
    fn test_add_creates_entity() {
        let store = InMemoryEntityStore::new();
        let id = store.add(email("a@x.com", 0.9)).unwrap();

        let entity = store.get(id).unwrap().unwrap();
        assert_eq!(entity.entity_type, EntityType::Email);
        assert_eq!(entity.attributes["address"], AttributeValue::from("a@x.com"));
        assert_eq!(entity.access_count, 1);
        assert!(entity.last_updated >= entity.first_seen);
        store.check_integrity().unwrap();
    }

    #[test]
    fn test_add_duplicate_averages_confidence() {
        let store = InMemoryEntityStore::new();
        let first = store.add(email("a@x.com", 0.9)).unwrap();
        let second = store.add(email("a@x.com", 0.7)).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.count().unwrap(), 1);
        let entity = store.get(first).unwrap().unwrap();
        assert!((entity.confidence_score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_merge_does_not_bump_access_count() {
        let store = InMemoryEntityStore::new();
        let id = store.add(email("a@x.com", 0.9)).unwrap();
        store.add(email("a@x.com", 0.9)).unwrap();
        store.add(email("a@x.com", 0.9)).unwrap();

        let entity = store.get(id).unwrap().unwrap();
        assert_eq!(entity.access_count, 1);
    }

    #[test]
    fn test_get_counts_access() {
        let store = InMemoryEntityStore::new();
        let id = store.add(email("a@x.com", 0.9)).unwrap();
        store.get(id).unwrap();
        let entity = store.get(id).unwrap().unwrap();
        assert_eq!(entity.access_count, 2);
    }

    #[test]
    fn test_get_unknown_is_none() {
        let store = InMemoryEntityStore::new();
        assert!(store.get(EntityId::new()).unwrap().is_none());
    }

    #[test]
    fn test_query_does_not_count_access() {
        let store = InMemoryEntityStore::new();
        store.add(email("a@x.com", 0.9)).unwrap();
        store.query(&EntityQuery::new()).unwrap();
        let results = store.query(&EntityQuery::new()).unwrap();
        assert_eq!(results[0].access_count, 0);
    }

    #[test]
    fn test_with_config_rejects_bad_threshold() {
        let err = InMemoryEntityStore::with_config(StoreConfig::with_threshold(2.0)).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidThreshold { .. }));
    }

    #[test]
    fn test_threshold_one_requires_exact_match() {
        let store = InMemoryEntityStore::with_config(StoreConfig::with_threshold(1.0)).unwrap();
        store.add(email("a@x.com", 0.9)).unwrap();
        store.add(email("A@X.COM", 0.9)).unwrap();
        // Case-insensitive equality still scores 1.0.
        assert_eq!(store.count().unwrap(), 1);
        store.add(email("a@x.co", 0.9)).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_cleanup_removes_stale_unread_entities() {
        let store = InMemoryEntityStore::new();
        let stale = store.add(email("old@x.com", 0.9)).unwrap();
        let fresh = store.add(email("new@y.org", 0.9)).unwrap();
        store.backdate(stale, Duration::days(100));

        assert_eq!(store.cleanup(90).unwrap(), 1);
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.query(&EntityQuery::new()).unwrap()[0].id, fresh);
        store.check_integrity().unwrap();
    }

    #[test]
    fn test_cleanup_keeps_accessed_entities() {
        let store = InMemoryEntityStore::new();
        let id = store.add(email("old@x.com", 0.9)).unwrap();
        store.get(id).unwrap();
        store.backdate(id, Duration::days(1000));

        assert_eq!(store.cleanup(90).unwrap(), 0);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_cleanup_with_max_retention_keeps_everything() {
        let store = InMemoryEntityStore::new();
        let id = store.add(email("old@x.com", 0.9)).unwrap();
        store.backdate(id, Duration::days(10_000));

        assert_eq!(store.cleanup(u32::MAX).unwrap(), 0);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_cleanup_default_uses_config() {
        let config = StoreConfig {
            default_retention_days: 7,
            ..StoreConfig::default()
        };
        let store = InMemoryEntityStore::with_config(config).unwrap();
        let id = store.add(email("old@x.com", 0.9)).unwrap();
        store.backdate(id, Duration::days(8));
        assert_eq!(store.cleanup_default().unwrap(), 1);
    }

    #[test]
    fn test_cleanup_empties_index_buckets() {
        let store = InMemoryEntityStore::new();
        let obs = Observation::builder(EntityType::Url)
            .attribute("href", "https://example.com")
            .source_workflow("wf-crawl")
            .confidence(0.6)
            .build()
            .unwrap();
        let id = store.add(obs).unwrap();
        store.backdate(id, Duration::days(91));
        store.cleanup(90).unwrap();

        assert!(store.find_by_workflow("wf-crawl").unwrap().is_empty());
        assert!(store
            .query(&EntityQuery::new().entity_type(EntityType::Url))
            .unwrap()
            .is_empty());
        store.check_integrity().unwrap();
    }

    #[test]
    fn test_stats_recent_window() {
        let store = InMemoryEntityStore::new();
        let old = store.add(email("old@x.com", 0.4)).unwrap();
        store.add(email("new@y.org", 0.8)).unwrap();
        store.backdate(old, Duration::hours(2));

        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.count_of(EntityType::Email), 2);
        assert_eq!(stats.recently_updated, 1);
        assert!((stats.avg_confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_stats_with_window_beyond_calendar_range() {
        let config = StoreConfig {
            recent_window_secs: 1_000_000_000_000_000,
            ..StoreConfig::default()
        };
        let store = InMemoryEntityStore::with_config(config).unwrap();
        let old = store.add(email("old@x.com", 0.4)).unwrap();
        store.backdate(old, Duration::days(3650));

        assert_eq!(store.stats().unwrap().recently_updated, 1);

        let too_large = StoreConfig {
            recent_window_secs: i64::MAX,
            ..StoreConfig::default()
        };
        assert!(InMemoryEntityStore::with_config(too_large).is_err());
    }

    #[test]
    fn test_related_resolves_and_tolerates_dangling() {
        let store = InMemoryEntityStore::new();
        let company = store
            .add(
                Observation::builder(EntityType::Company)
                    .attribute("name", "Acme")
                    .confidence(0.9)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let ghost = EntityId::new();
        let person = store
            .add(
                Observation::builder(EntityType::Person)
                    .attribute("name", "Ada")
                    .relationship(Relationship::new(company, RelationshipKind::WorksAt))
                    .related(ghost, RelationshipKind::Contacted)
                    .confidence(0.9)
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let resolved = store.related(person).unwrap().unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].target.as_ref().map(|e| e.id), Some(company));
        assert!(resolved[1].target.is_none());
        assert!(store.related(EntityId::new()).unwrap().is_none());

        // Resolving does not count as an access.
        let results = store.query(&EntityQuery::new()).unwrap();
        assert!(results.iter().all(|e| e.access_count == 0));
    }

    #[test]
    fn test_clear_resets_everything() {
        let store = InMemoryEntityStore::new();
        let obs = Observation::builder(EntityType::Document)
            .attribute("title", "Q3 report")
            .source_workflow("wf-pdf")
            .confidence(0.5)
            .build()
            .unwrap();
        store.add(obs).unwrap();
        store.clear().unwrap();

        assert_eq!(store.count().unwrap(), 0);
        assert!(store.find_by_workflow("wf-pdf").unwrap().is_empty());
        assert_eq!(store.stats().unwrap().total, 0);
        store.check_integrity().unwrap();
    }
}
