//! Integration tests for the process-wide `EventRegistry`.
//!
//! Every test here touches the shared instance, so they run one at a time.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::TimeZone;
use herald_core::error::EventError;
use herald_core::event::{DomainEvent, EventHeader, EventRecord, FromRecord, GenericEvent};
use herald_core::registry::EventRegistry;
use herald_test_support::FixedClock;

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    let guard = SERIAL
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    EventRegistry::reset_instance();
    guard
}

#[test]
fn test_get_instance_returns_same_instance_until_reset() {
    let _guard = serial();

    let first = EventRegistry::get_instance();
    let second = EventRegistry::get_instance();
    assert!(Arc::ptr_eq(&first, &second));

    EventRegistry::reset_instance();
    let third = EventRegistry::get_instance();
    assert!(!Arc::ptr_eq(&first, &third));
}

#[test]
fn test_reset_instance_yields_empty_registry() {
    let _guard = serial();
    EventRegistry::get_instance().register_event::<GenericEvent>("test.event");

    EventRegistry::reset_instance();

    assert!(!EventRegistry::get_instance().has("test.event"));
}

#[test]
fn test_clear_keeps_instance_identity() {
    let _guard = serial();
    let before = EventRegistry::get_instance();
    before.register_event::<GenericEvent>("test.event");

    EventRegistry::get_instance().clear();

    let after = EventRegistry::get_instance();
    assert!(Arc::ptr_eq(&before, &after));
    assert!(!after.has("test.event"));
}

#[test]
fn test_registration_is_visible_to_every_holder() {
    let _guard = serial();
    let writer = EventRegistry::get_instance();
    let reader = EventRegistry::get_instance();

    writer.register_event::<GenericEvent>("shared.event");

    assert!(reader.has("shared.event"));
}

#[test]
fn test_missing_deserializer_message_contains_type_and_remedy() {
    let _guard = serial();
    let record = GenericEvent::new("missing.event")
        .unwrap()
        .to_record()
        .unwrap();

    let err = EventRegistry::get_instance()
        .deserialize(&record)
        .unwrap_err();

    assert!(matches!(err, EventError::DeserializerNotFound { .. }));
    let message = err.to_string();
    assert!(message.contains("missing.event"));
    assert!(message.contains("EventRegistry::get_instance().register"));
}

#[test]
fn test_record_round_trip_preserves_identity_fields() {
    // Arrange
    let _guard = serial();
    let clock = FixedClock(chrono::Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
    let registry = EventRegistry::get_instance();
    registry.register_event::<GenericEvent>("test.event");
    let original = GenericEvent::from_parts(
        EventHeader::new_with_clock("test.event", &clock)
            .unwrap()
            .with_aggregate_id("agg-1")
            .with_metadata_entry("tenant", "acme"),
        serde_json::Map::new(),
    );

    // Act
    let json = original.to_record().unwrap().to_json().unwrap();
    let record = EventRecord::from_json(&json).unwrap();
    let restored = registry.deserialize(&record).unwrap();

    // Assert
    assert_eq!(restored.header().id(), original.header().id());
    assert_eq!(restored.event_type(), "test.event");
    assert_eq!(restored.header().aggregate_id(), Some("agg-1"));
    assert_eq!(restored.header().metadata(), original.header().metadata());
    assert_eq!(restored.header().occurred_on(), clock.0);
    assert_eq!(
        GenericEvent::from_record(&record).unwrap(),
        original
    );
}
