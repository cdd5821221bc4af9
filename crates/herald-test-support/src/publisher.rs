//! Mock `EventPublisher` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use herald_bus::bus::PublishOutcome;
use herald_bus::error::BusError;
use herald_bus::publisher::EventPublisher;
use herald_core::error::EventError;
use herald_core::event::{DomainEvent, EventRecord};

/// A publisher that records the canonical record of every published event
/// and always reports delivery to zero listeners.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<EventRecord>>,
}

impl RecordingPublisher {
    /// Create a publisher with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all records that were published.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<EventRecord> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &dyn DomainEvent) -> Result<PublishOutcome, BusError> {
        let record = event.to_record()?;
        self.published.lock().unwrap().push(record);
        Ok(PublishOutcome::Delivered { listeners: 0 })
    }
}

/// A publisher that always fails. Useful for testing error-handling paths.
#[derive(Debug)]
pub struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _event: &dyn DomainEvent) -> Result<PublishOutcome, BusError> {
        Err(BusError::Event(EventError::InvalidArgument(
            "publisher unavailable".into(),
        )))
    }
}
