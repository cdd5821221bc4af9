//! Event type registry.
//!
//! Maps an event type string to the function that rebuilds a typed
//! [`DomainEvent`] from its [`EventRecord`]. A process-wide instance is
//! available through [`EventRegistry::get_instance`]; independent instances
//! can be built with [`EventRegistry::new`] for explicit wiring.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::error::EventError;
use crate::event::{DomainEvent, EventRecord, FromRecord};

/// Function that reconstructs a domain event from its canonical record.
pub type Deserializer =
    Arc<dyn Fn(&EventRecord) -> Result<Box<dyn DomainEvent>, EventError> + Send + Sync>;

static INSTANCE: RwLock<Option<Arc<EventRegistry>>> = RwLock::new(None);

/// Mapping from event type to deserializer. At most one deserializer is held
/// per type; registering again replaces the previous one.
#[derive(Default)]
pub struct EventRegistry {
    deserializers: RwLock<HashMap<String, Deserializer>>,
}

impl EventRegistry {
    /// Creates an empty registry that is independent of the process-wide one.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry, creating it on first access.
    ///
    /// Repeated calls return the same instance until
    /// [`EventRegistry::reset_instance`] is called.
    #[must_use]
    pub fn get_instance() -> Arc<Self> {
        {
            let slot = INSTANCE.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(registry) = slot.as_ref() {
                return Arc::clone(registry);
            }
        }
        let mut slot = INSTANCE.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slot.get_or_insert_with(|| {
            debug!("creating process-wide event registry");
            Arc::new(Self::new())
        }))
    }

    /// Discards the process-wide registry. The next
    /// [`EventRegistry::get_instance`] call creates a new, empty one.
    ///
    /// Holders of the previous instance keep a working, detached registry.
    pub fn reset_instance() {
        let mut slot = INSTANCE.write().unwrap_or_else(PoisonError::into_inner);
        if slot.take().is_some() {
            debug!("process-wide event registry reset");
        }
    }

    /// Stores `deserializer` under `event_type`, replacing any existing entry.
    pub fn register<F>(&self, event_type: impl Into<String>, deserializer: F)
    where
        F: Fn(&EventRecord) -> Result<Box<dyn DomainEvent>, EventError> + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let replaced = self
            .write()
            .insert(event_type.clone(), Arc::new(deserializer))
            .is_some();
        debug!(event_type = %event_type, replaced, "registered event deserializer");
    }

    /// Registers `E::from_record` as the deserializer for `event_type`.
    pub fn register_event<E>(&self, event_type: impl Into<String>)
    where
        E: DomainEvent + FromRecord,
    {
        self.register(event_type, |record| {
            Ok(Box::new(E::from_record(record)?) as Box<dyn DomainEvent>)
        });
    }

    /// Removes the deserializer for `event_type`. Returns whether one was
    /// registered.
    pub fn unregister(&self, event_type: &str) -> bool {
        self.write().remove(event_type).is_some()
    }

    /// Returns whether a deserializer is registered for `event_type`.
    #[must_use]
    pub fn has(&self, event_type: &str) -> bool {
        self.read().contains_key(event_type)
    }

    /// Returns the registered event types, sorted.
    #[must_use]
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.read().keys().cloned().collect();
        types.sort_unstable();
        types
    }

    /// Number of registered event types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns whether no deserializers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Removes every deserializer. The registry itself stays in place.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Rebuilds a typed event from `record` using the deserializer registered
    /// for `record.event_type`.
    ///
    /// # Errors
    ///
    /// Returns `EventError::DeserializerNotFound` if no deserializer is
    /// registered for the type. Errors returned by the deserializer itself
    /// are passed through unchanged.
    pub fn deserialize(&self, record: &EventRecord) -> Result<Box<dyn DomainEvent>, EventError> {
        let deserializer = self.read().get(&record.event_type).cloned().ok_or_else(|| {
            EventError::DeserializerNotFound {
                event_type: record.event_type.clone(),
            }
        })?;
        deserializer(record)
    }

    /// Parses `json` as an [`EventRecord`] and rebuilds the typed event.
    ///
    /// # Errors
    ///
    /// Returns `EventError::Serialization` if `json` is not a valid record,
    /// otherwise as [`EventRegistry::deserialize`].
    pub fn deserialize_json(&self, json: &str) -> Result<Box<dyn DomainEvent>, EventError> {
        self.deserialize(&EventRecord::from_json(json)?)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Deserializer>> {
        self.deserializers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Deserializer>> {
        self.deserializers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("event_types", &self.registered_types())
            .finish()
    }
}
