//! Domain event bus.
//!
//! Events are published as canonical [`EventRecord`]s on the channel named
//! by their type and, unless disabled, on the [`WILDCARD_CHANNEL`].

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{self, BoxFuture, FutureExt};
use herald_core::clock::{Clock, SystemClock};
use herald_core::event::{DomainEvent, EventRecord, FromRecord};
use herald_emitter::emitter::{Listener, TypedEventEmitter};
use herald_emitter::error::{EmitError, ListenerError, ListenerResult};
use tracing::{debug, instrument};

use crate::cache::{PublishCache, cache_key};
use crate::config::EventBusConfig;
use crate::error::BusError;

/// Channel that receives every published event.
pub const WILDCARD_CHANNEL: &str = "*";

/// Result of a successful publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The event was handed to every subscriber.
    Delivered {
        /// Number of subscribers that ran.
        listeners: usize,
    },
    /// An event with the same cache key was already delivered.
    Deduplicated,
}

/// Handle returned by the `subscribe*` methods, used to unsubscribe.
#[derive(Debug, Clone)]
pub struct Subscription {
    channel: String,
    listener: Listener<Arc<EventRecord>>,
}

impl Subscription {
    /// The channel (event type or `*`) this subscription listens on.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// In-process publish/subscribe over domain events.
///
/// Each bus owns its emitter and cache; separate buses share nothing.
pub struct EventBus {
    emitter: TypedEventEmitter<Arc<EventRecord>>,
    config: EventBusConfig,
    cache: Option<Mutex<PublishCache>>,
    clock: Arc<dyn Clock>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}

impl EventBus {
    /// Creates a bus using the system clock.
    #[must_use]
    pub fn new(config: EventBusConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a bus whose cache expiry is measured with `clock`.
    #[must_use]
    pub fn with_clock(config: EventBusConfig, clock: Arc<dyn Clock>) -> Self {
        let cache = config
            .enable_cache
            .then(|| Mutex::new(PublishCache::from_config(&config)));
        Self {
            emitter: TypedEventEmitter::new(),
            config,
            cache,
            clock,
        }
    }

    /// The settings this bus was built with.
    #[must_use]
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    /// The underlying emitter.
    #[must_use]
    pub fn emitter(&self) -> &TypedEventEmitter<Arc<EventRecord>> {
        &self.emitter
    }

    /// Publishes `event` to the subscribers of its type and waits until all
    /// of them have finished.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Event` if the event cannot be serialized and
    /// `BusError::Delivery` if any subscriber failed.
    #[instrument(skip_all, fields(event_type = %event.event_type(), event_id = %event.header().id()))]
    pub async fn publish(&self, event: &dyn DomainEvent) -> Result<PublishOutcome, BusError> {
        let record = event.to_record()?;
        self.publish_record(record).await
    }

    /// Parses a serialized record and publishes it.
    ///
    /// # Errors
    ///
    /// As [`EventBus::publish_record`], plus `BusError::Event` for text that
    /// is not a valid record.
    pub async fn publish_json(&self, json: &str) -> Result<PublishOutcome, BusError> {
        let record = EventRecord::from_json(json)?;
        self.publish_record(record).await
    }

    /// Publishes an already serialized event.
    ///
    /// With the cache enabled, a record whose key was already delivered is
    /// skipped. The key is remembered only after every subscriber
    /// succeeded, so a failed publish may be retried.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Event` if the record fails
    /// [`EventRecord::validate`] or its cache key cannot be derived, and
    /// `BusError::Delivery` with every subscriber failure otherwise.
    pub async fn publish_record(&self, record: EventRecord) -> Result<PublishOutcome, BusError> {
        record.validate()?;

        let key = match &self.cache {
            Some(cache) => {
                let key = cache_key(self.config.cache_key, &record)?;
                if lock(cache).contains(&key, self.clock.now()) {
                    debug!(event_type = %record.event_type, key = %key, "skipping duplicate publish");
                    return Ok(PublishOutcome::Deduplicated);
                }
                Some(key)
            }
            None => None,
        };

        let event_type = record.event_type.clone();
        let record = Arc::new(record);
        let mut listeners = 0;
        let mut failures = Vec::new();

        match self.emitter.emit(&event_type, Arc::clone(&record)).await {
            Ok(count) => listeners += count,
            Err(err) => failures.extend(err.into_failures()),
        }
        if self.config.enable_wildcard && event_type != WILDCARD_CHANNEL {
            match self.emitter.emit(WILDCARD_CHANNEL, record).await {
                Ok(count) => listeners += count,
                Err(err) => failures.extend(err.into_failures()),
            }
        }

        if let Some(err) = EmitError::from_failures(&event_type, failures) {
            return Err(err.into());
        }
        if let (Some(cache), Some(key)) = (&self.cache, key) {
            lock(cache).record(key, self.clock.now());
        }
        debug!(event_type = %event_type, listeners, "event delivered");
        Ok(PublishOutcome::Delivered { listeners })
    }

    /// Runs `handler` for every published event of `event_type`.
    pub fn subscribe<F, Fut>(&self, event_type: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(Arc<EventRecord>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ListenerResult> + Send + 'static,
    {
        self.attach(event_type.into(), Listener::new(handler), false)
    }

    /// Runs a synchronous `handler` for every published event of
    /// `event_type`.
    pub fn subscribe_sync<F>(&self, event_type: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(Arc<EventRecord>) -> ListenerResult + Send + Sync + 'static,
    {
        self.attach(event_type.into(), Listener::sync(handler), false)
    }

    /// Runs `handler` for the next published event of `event_type` only.
    pub fn subscribe_once<F, Fut>(&self, event_type: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(Arc<EventRecord>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ListenerResult> + Send + 'static,
    {
        self.attach(event_type.into(), Listener::new(handler), true)
    }

    /// Runs `handler` with the decoded event for every published event of
    /// `event_type`. A record that does not decode as `E` counts as a
    /// failure of this subscriber.
    pub fn subscribe_typed<E, F, Fut>(&self, event_type: impl Into<String>, handler: F) -> Subscription
    where
        E: FromRecord + Send + 'static,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ListenerResult> + Send + 'static,
    {
        let listener = Listener::new(move |record: Arc<EventRecord>| -> BoxFuture<'static, ListenerResult> {
            match E::from_record(&record) {
                Ok(event) => handler(event).boxed(),
                Err(err) => future::ready(Err(Box::new(err) as ListenerError)).boxed(),
            }
        });
        self.attach(event_type.into(), listener, false)
    }

    /// Runs `handler` for every published event, whatever its type.
    pub fn subscribe_all<F, Fut>(&self, handler: F) -> Subscription
    where
        F: Fn(Arc<EventRecord>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ListenerResult> + Send + 'static,
    {
        self.subscribe(WILDCARD_CHANNEL, handler)
    }

    /// Removes one registration of `subscription`. Returns whether it was
    /// still registered.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.emitter
            .off(&subscription.channel, &subscription.listener)
    }

    /// Number of subscribers for `event_type`.
    #[must_use]
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.emitter.listener_count(event_type)
    }

    /// Sorted list of channels with at least one subscriber.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.emitter.event_names()
    }

    /// Forgets every delivered cache key.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            lock(cache).clear();
        }
    }

    /// Number of remembered cache keys; zero when caching is disabled.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| lock(cache).len())
    }

    fn attach(
        &self,
        channel: String,
        listener: Listener<Arc<EventRecord>>,
        once: bool,
    ) -> Subscription {
        if once {
            self.emitter.once(channel.clone(), listener.clone());
        } else {
            self.emitter.on(channel.clone(), listener.clone());
        }
        debug!(channel = %channel, once, "subscribed");
        Subscription { channel, listener }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.config)
            .field("emitter", &self.emitter)
            .field("cached_keys", &self.cache_len())
            .finish_non_exhaustive()
    }
}

fn lock(cache: &Mutex<PublishCache>) -> MutexGuard<'_, PublishCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}
