//! Aggregate statistics over a store.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityType};

/// Snapshot of store contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStats {
    pub total: usize,

    /// Count per type; every type is present, zero-filled.
    pub by_type: BTreeMap<EntityType, usize>,

    /// Mean confidence over all entities; 0.0 for an empty store.
    pub avg_confidence: f64,

    /// Entities whose `last_updated` falls inside the recent window.
    pub recently_updated: usize,
}

impl Default for EntityStats {
    fn default() -> Self {
        Self {
            total: 0,
            by_type: EntityType::ALL.into_iter().map(|t| (t, 0)).collect(),
            avg_confidence: 0.0,
            recently_updated: 0,
        }
    }
}

impl EntityStats {
    /// Computes statistics over `entities` as of `now`.
    ///
    /// A window reaching past the earliest representable time counts every
    /// entity as recent.
    #[allow(clippy::cast_precision_loss)]
    pub fn collect<'a, I>(entities: I, now: DateTime<Utc>, recent_window: Duration) -> Self
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        let cutoff = now
            .checked_sub_signed(recent_window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut stats = Self::default();
        let mut confidence_sum = 0.0;

        for entity in entities {
            stats.total += 1;
            *stats.by_type.entry(entity.entity_type).or_insert(0) += 1;
            confidence_sum += entity.confidence_score;
            if entity.last_updated > cutoff {
                stats.recently_updated += 1;
            }
        }

        if stats.total > 0 {
            stats.avg_confidence = confidence_sum / stats.total as f64;
        }
        stats
    }

    /// Count for a single type.
    #[must_use]
    pub fn count_of(&self, entity_type: EntityType) -> usize {
        self.by_type.get(&entity_type).copied().unwrap_or(0)
    }
}
