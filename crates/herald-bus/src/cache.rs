//! Publish deduplication cache.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use herald_core::error::EventError;
use herald_core::event::EventRecord;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::config::{CacheKeyStrategy, EventBusConfig};

/// Derives the cache key for `record` under `strategy`. The same record
/// always yields the same key.
///
/// # Errors
///
/// Returns `EventError::Serialization` if the record cannot be rendered for
/// hashing.
pub fn cache_key(strategy: CacheKeyStrategy, record: &EventRecord) -> Result<String, EventError> {
    match strategy {
        CacheKeyStrategy::EventId => Ok(record.id.clone()),
        CacheKeyStrategy::TypeAndAggregate => Ok(format!(
            "{}:{}",
            record.event_type,
            record.aggregate_id.as_deref().unwrap_or_default()
        )),
        CacheKeyStrategy::ContentHash => {
            let content = json!({
                "type": record.event_type,
                "aggregateId": record.aggregate_id,
                "version": record.version,
                "metadata": record.metadata,
                "payload": record.payload,
            });
            let digest = Sha256::digest(serde_json::to_vec(&content)?);
            Ok(format!("{digest:x}"))
        }
    }
}

/// Keys of successfully delivered events, with first-in first-out eviction
/// and optional expiry.
#[derive(Debug, Clone)]
pub struct PublishCache {
    capacity: Option<usize>,
    ttl: Option<Duration>,
    entries: HashMap<String, DateTime<Utc>>,
    order: VecDeque<String>,
}

impl PublishCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(capacity: Option<usize>, ttl: Option<Duration>) -> Self {
        Self {
            capacity,
            ttl,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Creates an empty cache sized from `config`.
    #[must_use]
    pub fn from_config(config: &EventBusConfig) -> Self {
        let ttl = config.cache_ttl_secs.map(|secs| {
            i64::try_from(secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX)
        });
        Self::new(config.cache_capacity, ttl)
    }

    /// Returns whether `key` is remembered at `now`. Expired keys are
    /// dropped.
    pub fn contains(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        let Some(recorded_at) = self.entries.get(key).copied() else {
            return false;
        };
        if self.ttl.is_some_and(|ttl| now - recorded_at >= ttl) {
            self.entries.remove(key);
            self.order.retain(|k| k != key);
            return false;
        }
        true
    }

    /// Remembers `key` as delivered at `now`. Keys expired at `now` are
    /// dropped first, then the oldest keys are evicted when over capacity.
    pub fn record(&mut self, key: String, now: DateTime<Utc>) {
        self.purge_expired(now);
        if self.entries.insert(key.clone(), now).is_some() {
            self.order.retain(|k| *k != key);
        }
        self.order.push_back(key);
        while self.capacity.is_some_and(|capacity| self.entries.len() > capacity) {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }

    /// Number of remembered keys, including any not yet found expired.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no keys are remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets every key.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    // `order` is sorted by record time, so expired keys sit at the front.
    fn purge_expired(&mut self, now: DateTime<Utc>) {
        let Some(ttl) = self.ttl else {
            return;
        };
        while let Some(oldest) = self.order.front() {
            if self
                .entries
                .get(oldest)
                .is_some_and(|recorded_at| now - *recorded_at < ttl)
            {
                break;
            }
            if let Some(expired) = self.order.pop_front() {
                self.entries.remove(&expired);
            }
        }
    }
}
