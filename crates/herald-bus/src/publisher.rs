//! Publisher abstraction.

use async_trait::async_trait;
use herald_core::event::DomainEvent;

use crate::bus::{EventBus, PublishOutcome};
use crate::error::BusError;

/// Anything that can deliver domain events. Application code depends on
/// this trait so tests can substitute a recording implementation.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes `event` and waits for delivery to complete.
    async fn publish(&self, event: &dyn DomainEvent) -> Result<PublishOutcome, BusError>;
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, event: &dyn DomainEvent) -> Result<PublishOutcome, BusError> {
        EventBus::publish(self, event).await
    }
}
