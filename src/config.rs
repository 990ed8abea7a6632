//! Store configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default similarity an observation must reach to merge into an entity.
pub const DEFAULT_DEDUP_THRESHOLD: f64 = 0.85;

/// Default age after which never-read entities are swept.
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// Default window for the "recently updated" statistic.
pub const DEFAULT_RECENT_WINDOW_SECS: i64 = 60 * 60;

/// Configuration for an entity store.
///
/// Fixed at construction; a store never changes its threshold while running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Minimum similarity in [0.0, 1.0] for an observation to be treated as
    /// an existing entity.
    pub dedup_threshold: f64,

    /// Retention used by `InMemoryEntityStore::cleanup_default`.
    pub default_retention_days: u32,

    /// Entities updated within this many seconds count as recently updated.
    pub recent_window_secs: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
            default_retention_days: DEFAULT_RETENTION_DAYS,
            recent_window_secs: DEFAULT_RECENT_WINDOW_SECS,
        }
    }
}

impl StoreConfig {
    /// Returns a default config with a different threshold.
    #[must_use]
    pub fn with_threshold(dedup_threshold: f64) -> Self {
        Self {
            dedup_threshold,
            ..Self::default()
        }
    }

    /// Parses a config from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` on malformed JSON and any
    /// error from [`StoreConfig::validate`].
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfig {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field is usable.
    ///
    /// # Errors
    ///
    /// - `InvalidThreshold` if the threshold is NaN or outside [0.0, 1.0].
    /// - `InvalidRetention` if the default retention is zero days.
    /// - `InvalidConfig` if the recent window is negative or too large to be
    ///   a duration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.dedup_threshold.is_nan() || !(0.0..=1.0).contains(&self.dedup_threshold) {
            return Err(ValidationError::InvalidThreshold {
                value: self.dedup_threshold,
            });
        }
        if self.default_retention_days == 0 {
            return Err(ValidationError::InvalidRetention {
                days: self.default_retention_days,
            });
        }
        if self.recent_window_secs < 0 {
            return Err(ValidationError::InvalidConfig {
                reason: format!(
                    "recent_window_secs must be non-negative, got {}",
                    self.recent_window_secs
                ),
            });
        }
        if Duration::try_seconds(self.recent_window_secs).is_none() {
            return Err(ValidationError::InvalidConfig {
                reason: format!(
                    "recent_window_secs is out of range, got {}",
                    self.recent_window_secs
                ),
            });
        }
        Ok(())
    }

    /// The recent-update window as a duration, saturating at the largest
    /// representable duration.
    #[must_use]
    pub fn recent_window(&self) -> Duration {
        Duration::try_seconds(self.recent_window_secs).unwrap_or_else(Duration::max_value)
    }
}
