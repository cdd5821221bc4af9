//! Event bus configuration.

use serde::{Deserialize, Serialize};

/// How the publish cache derives a key from an event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKeyStrategy {
    /// The event id: republishing the same event is a no-op.
    #[default]
    EventId,
    /// Event type plus aggregate id: one delivery per type and entity.
    TypeAndAggregate,
    /// SHA-256 of the record without its id and timestamp: identical
    /// content is delivered once even under different ids.
    ContentHash,
}

/// Settings for an [`EventBus`](crate::bus::EventBus).
///
/// Every field has a default, so a partial document deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Suppress publishes whose cache key was already delivered.
    pub enable_cache: bool,
    /// Cache key derivation.
    pub cache_key: CacheKeyStrategy,
    /// Maximum number of remembered keys; the oldest is evicted first.
    /// `None` keeps every key.
    pub cache_capacity: Option<usize>,
    /// Seconds a key is remembered. `None` keeps keys until evicted.
    pub cache_ttl_secs: Option<u64>,
    /// Also deliver every event to subscribers of the `*` channel.
    pub enable_wildcard: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            enable_cache: false,
            cache_key: CacheKeyStrategy::EventId,
            cache_capacity: None,
            cache_ttl_secs: None,
            enable_wildcard: true,
        }
    }
}

impl EventBusConfig {
    /// Default settings with the publish cache turned on.
    #[must_use]
    pub fn cached() -> Self {
        Self {
            enable_cache: true,
            ..Self::default()
        }
    }

    /// Sets the cache key strategy.
    #[must_use]
    pub fn with_cache_key(mut self, strategy: CacheKeyStrategy) -> Self {
        self.cache_key = strategy;
        self
    }

    /// Bounds the number of remembered keys.
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// Expires remembered keys after `secs` seconds.
    #[must_use]
    pub fn with_cache_ttl_secs(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = Some(secs);
        self
    }

    /// Turns wildcard delivery on or off.
    #[must_use]
    pub fn with_wildcard(mut self, enabled: bool) -> Self {
        self.enable_wildcard = enabled;
        self
    }
}
