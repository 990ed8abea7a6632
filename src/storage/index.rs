//! Secondary indexes.
//!
//! Both indexes map a key to an insertion-ordered set of entity ids. Order
//! matters: deduplication scans a type bucket in the order entities were
//! created and takes the first match.

use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::entity::{EntityId, EntityType};

/// Set of entity ids that remembers insertion order.
#[derive(Debug, Clone, Default)]
pub(crate) struct OrderedIdSet {
    order: Vec<EntityId>,
    members: HashSet<EntityId>,
}

impl OrderedIdSet {
    /// Inserts `id` at the end; returns false if it was already present.
    pub(crate) fn insert(&mut self, id: EntityId) -> bool {
        if !self.members.insert(id) {
            return false;
        }
        self.order.push(id);
        true
    }

    pub(crate) fn contains(&self, id: &EntityId) -> bool {
        self.members.contains(id)
    }

    /// Removes every id in `ids` in one pass.
    pub(crate) fn remove_all(&mut self, ids: &HashSet<EntityId>) {
        if ids.is_empty() {
            return;
        }
        self.order.retain(|id| !ids.contains(id));
        self.members.retain(|id| !ids.contains(id));
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &EntityId> + '_ {
        self.order.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Key to ordered id set mapping. Empty buckets are dropped.
#[derive(Debug, Clone)]
pub(crate) struct KeyedIndex<K> {
    buckets: HashMap<K, OrderedIdSet>,
}

impl<K> Default for KeyedIndex<K> {
    fn default() -> Self {
        Self {
            buckets: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq> KeyedIndex<K> {
    /// Idempotent: re-inserting an id keeps its original position.
    pub(crate) fn insert(&mut self, key: K, id: EntityId) {
        self.buckets.entry(key).or_default().insert(id);
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&OrderedIdSet>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.buckets.get(key)
    }

    /// Removes `ids` from every bucket.
    pub(crate) fn remove_all(&mut self, ids: &HashSet<EntityId>) {
        if ids.is_empty() {
            return;
        }
        for bucket in self.buckets.values_mut() {
            bucket.remove_all(ids);
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());
    }

    pub(crate) fn buckets(&self) -> impl Iterator<Item = (&K, &OrderedIdSet)> + '_ {
        self.buckets.iter()
    }
}

/// Entity type to ids.
pub(crate) type TypeIndex = KeyedIndex<EntityType>;

/// Workflow id to ids of every entity it contributed to.
pub(crate) type WorkflowIndex = KeyedIndex<String>;
