//! Domain event abstractions.
//!
//! Every event carries an [`EventHeader`] (identity, type, timestamp,
//! optional aggregate, schema version and free-form metadata). Concrete
//! event kinds add typed fields on top of the header and implement
//! [`DomainEvent`]. The [`EventRecord`] is the canonical JSON shape that
//! crosses process boundaries.

use std::any::Any;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::EventError;

/// Schema version assigned to events that do not specify one.
pub const DEFAULT_EVENT_VERSION: u32 = 1;

/// Top-level record keys owned by the base fields. Payload fields may not
/// reuse them.
pub const RESERVED_RECORD_KEYS: [&str; 6] =
    ["id", "type", "occurredOn", "aggregateId", "version", "metadata"];

/// Base fields shared by every domain event.
///
/// Identity, type and timestamp are fixed once the header is built; the
/// `with_*` methods are only available while constructing it.
#[derive(Debug, Clone, PartialEq)]
pub struct EventHeader {
    id: String,
    event_type: String,
    occurred_on: DateTime<Utc>,
    aggregate_id: Option<String>,
    version: u32,
    metadata: Map<String, Value>,
}

impl EventHeader {
    /// Creates a header for `event_type`, stamped with the system time and a
    /// freshly generated id.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidArgument` if `event_type` is empty.
    pub fn new(event_type: impl Into<String>) -> Result<Self, EventError> {
        Self::new_with_clock(event_type, &SystemClock)
    }

    /// Creates a header for `event_type`, stamped with `clock`.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidArgument` if `event_type` is empty.
    pub fn new_with_clock(
        event_type: impl Into<String>,
        clock: &dyn Clock,
    ) -> Result<Self, EventError> {
        let event_type = event_type.into();
        validate_event_type(&event_type)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            occurred_on: clock.now(),
            aggregate_id: None,
            version: DEFAULT_EVENT_VERSION,
            metadata: Map::new(),
        })
    }

    /// Replaces the generated id with a caller-supplied one.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidArgument` if `id` is empty.
    pub fn with_id(mut self, id: impl Into<String>) -> Result<Self, EventError> {
        let id = id.into();
        validate_id(&id)?;
        self.id = id;
        Ok(self)
    }

    /// Sets the identifier of the business entity this event concerns.
    #[must_use]
    pub fn with_aggregate_id(mut self, aggregate_id: impl Into<String>) -> Self {
        self.aggregate_id = Some(aggregate_id.into());
        self
    }

    /// Sets the schema version.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidArgument` if `version` is zero.
    pub fn with_version(mut self, version: u32) -> Result<Self, EventError> {
        validate_version(version)?;
        self.version = version;
        Ok(self)
    }

    /// Replaces the metadata map.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Adds a single metadata entry, replacing any previous value for `key`.
    #[must_use]
    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Rebuilds a header from a canonical record.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidArgument` if the record fails
    /// [`EventRecord::validate`].
    pub fn from_record(record: &EventRecord) -> Result<Self, EventError> {
        record.validate()?;
        Ok(Self {
            id: record.id.clone(),
            event_type: record.event_type.clone(),
            occurred_on: record.occurred_on,
            aggregate_id: record.aggregate_id.clone(),
            version: record.version,
            metadata: record.metadata.clone(),
        })
    }

    /// Builds the canonical record for this header with `payload` as the
    /// event-specific fields.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidArgument` if a payload key is one of
    /// [`RESERVED_RECORD_KEYS`].
    pub fn to_record(&self, payload: Map<String, Value>) -> Result<EventRecord, EventError> {
        validate_payload(&payload)?;
        Ok(EventRecord {
            id: self.id.clone(),
            event_type: self.event_type.clone(),
            occurred_on: self.occurred_on,
            aggregate_id: self.aggregate_id.clone(),
            version: self.version,
            metadata: self.metadata.clone(),
            payload,
        })
    }

    /// Unique event identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Type name used for routing and deserialization.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Timestamp of event creation.
    #[must_use]
    pub fn occurred_on(&self) -> DateTime<Utc> {
        self.occurred_on
    }

    /// Identifier of the business entity this event concerns, if any.
    #[must_use]
    pub fn aggregate_id(&self) -> Option<&str> {
        self.aggregate_id.as_deref()
    }

    /// Schema version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Free-form metadata, opaque to the bus.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }
}

fn validate_event_type(event_type: &str) -> Result<(), EventError> {
    if event_type.is_empty() {
        return Err(EventError::InvalidArgument(
            "event type must be a non-empty string".to_owned(),
        ));
    }
    Ok(())
}

fn validate_id(id: &str) -> Result<(), EventError> {
    if id.is_empty() {
        return Err(EventError::InvalidArgument(
            "event id must not be empty".to_owned(),
        ));
    }
    Ok(())
}

fn validate_payload(payload: &Map<String, Value>) -> Result<(), EventError> {
    match payload
        .keys()
        .find(|key| RESERVED_RECORD_KEYS.contains(&key.as_str()))
    {
        Some(key) => Err(EventError::InvalidArgument(format!(
            "payload field \"{key}\" collides with a base event field"
        ))),
        None => Ok(()),
    }
}

fn validate_version(version: u32) -> Result<(), EventError> {
    if version == 0 {
        return Err(EventError::InvalidArgument(
            "event version must be a positive integer".to_owned(),
        ));
    }
    Ok(())
}

fn default_version() -> u32 {
    DEFAULT_EVENT_VERSION
}

/// Canonical serialized form of a domain event.
///
/// This is the wire and storage contract: producers and consumers outside
/// the process exchange events in this shape. Event-specific fields sit at
/// the top level next to the base fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Unique event identifier.
    pub id: String,
    /// Event type name.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Creation timestamp, serialized as an RFC 3339 string.
    pub occurred_on: DateTime<Utc>,
    /// Identifier of the business entity this event concerns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_id: Option<String>,
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Event-specific fields.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl EventRecord {
    /// Parses a record from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns `EventError::Serialization` if `json` is not a valid record.
    pub fn from_json(json: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Renders the record as JSON text.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidArgument` if the record fails
    /// [`EventRecord::validate`], or `EventError::Serialization` if a
    /// payload value cannot be rendered.
    pub fn to_json(&self) -> Result<String, EventError> {
        self.validate()?;
        Ok(serde_json::to_string(self)?)
    }

    /// Checks the record against the construction rules: non-empty type and
    /// id, positive version, and no payload key shadowing a base field.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidArgument` naming the first violation.
    pub fn validate(&self) -> Result<(), EventError> {
        validate_event_type(&self.event_type)?;
        validate_id(&self.id)?;
        validate_version(self.version)?;
        validate_payload(&self.payload)
    }

    /// Decodes the event-specific fields into `T`.
    ///
    /// # Errors
    ///
    /// Returns `EventError::Deserialization` if the payload does not match
    /// `T`.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, EventError> {
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(|e| {
            EventError::Deserialization {
                event_type: self.event_type.clone(),
                message: e.to_string(),
            }
        })
    }
}

/// Serializes `value` into a payload object suitable for
/// [`EventHeader::to_record`].
///
/// # Errors
///
/// Returns `EventError::Serialization` if serialization fails, or
/// `EventError::InvalidArgument` if `value` is not a JSON object.
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Map<String, Value>, EventError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(EventError::InvalidArgument(format!(
            "event payload must serialize to a JSON object, got {other}"
        ))),
    }
}

/// Trait that all domain events implement.
pub trait DomainEvent: Any + Send + Sync + fmt::Debug {
    /// Returns the base fields of this event.
    fn header(&self) -> &EventHeader;

    /// Returns the event type name (used for routing and deserialization).
    fn event_type(&self) -> &str {
        self.header().event_type()
    }

    /// Returns the event-specific fields as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns `EventError` if the typed fields cannot be serialized.
    fn payload(&self) -> Result<Map<String, Value>, EventError> {
        Ok(Map::new())
    }

    /// Produces the canonical record for this event.
    ///
    /// # Errors
    ///
    /// Returns `EventError` if the payload cannot be serialized or reuses a
    /// base field name.
    fn to_record(&self) -> Result<EventRecord, EventError> {
        self.header().to_record(self.payload()?)
    }

    /// Returns `self` as `Any` for downcasting to the concrete kind.
    fn as_any(&self) -> &dyn Any;
}

impl dyn DomainEvent {
    /// Attempts to view this event as the concrete kind `T`.
    #[must_use]
    pub fn downcast_ref<T: DomainEvent>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Events that can rebuild themselves from a canonical record.
pub trait FromRecord: Sized {
    /// Reconstructs the event from `record`.
    ///
    /// # Errors
    ///
    /// Returns `EventError` if the record does not describe this event kind.
    fn from_record(record: &EventRecord) -> Result<Self, EventError>;
}

/// An event without a dedicated Rust type: a header plus free-form fields.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericEvent {
    header: EventHeader,
    payload: Map<String, Value>,
}

impl GenericEvent {
    /// Creates an event with an empty payload.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidArgument` if `event_type` is empty.
    pub fn new(event_type: impl Into<String>) -> Result<Self, EventError> {
        Ok(Self::from_parts(EventHeader::new(event_type)?, Map::new()))
    }

    /// Assembles an event from an existing header and payload.
    #[must_use]
    pub fn from_parts(header: EventHeader, payload: Map<String, Value>) -> Self {
        Self { header, payload }
    }

    /// Adds a payload field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Returns a payload field by name.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

impl DomainEvent for GenericEvent {
    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn payload(&self) -> Result<Map<String, Value>, EventError> {
        Ok(self.payload.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl FromRecord for GenericEvent {
    fn from_record(record: &EventRecord) -> Result<Self, EventError> {
        Ok(Self::from_parts(
            EventHeader::from_record(record)?,
            record.payload.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    struct StoppedClock(DateTime<Utc>);

    impl Clock for StoppedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_new_header_generates_unique_ids() {
        let ids: HashSet<String> = (0..1_000)
            .map(|_| EventHeader::new("test.event").unwrap().id().to_owned())
            .collect();

        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn test_new_header_applies_defaults() {
        let header = EventHeader::new_with_clock("test.event", &StoppedClock(fixed_now())).unwrap();

        assert_eq!(header.event_type(), "test.event");
        assert_eq!(header.occurred_on(), fixed_now());
        assert_eq!(header.version(), DEFAULT_EVENT_VERSION);
        assert!(header.aggregate_id().is_none());
        assert!(header.metadata().is_empty());
    }

    #[test]
    fn test_occurred_on_is_stable_across_reads_and_clones() {
        let header = EventHeader::new("test.event").unwrap();
        let first = header.occurred_on();

        std::thread::sleep(std::time::Duration::from_millis(5));
        let cloned = header.clone();

        assert_eq!(header.occurred_on(), first);
        assert_eq!(cloned.occurred_on(), first);
    }

    #[test]
    fn test_empty_event_type_is_rejected() {
        let result = EventHeader::new("");

        match result {
            Err(EventError::InvalidArgument(msg)) => assert!(msg.contains("event type")),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_version_is_rejected() {
        let result = EventHeader::new("test.event").unwrap().with_version(0);

        assert!(matches!(result, Err(EventError::InvalidArgument(_))));
    }

    #[test]
    fn test_empty_supplied_id_is_rejected() {
        let result = EventHeader::new("test.event").unwrap().with_id("");

        assert!(matches!(result, Err(EventError::InvalidArgument(_))));
    }

    #[test]
    fn test_record_serializes_to_canonical_shape() {
        // Arrange
        let event = GenericEvent::from_parts(
            EventHeader::new_with_clock("codegen.started", &StoppedClock(fixed_now()))
                .unwrap()
                .with_id("evt-1")
                .unwrap()
                .with_aggregate_id("job-42")
                .with_metadata_entry("source", "cli"),
            Map::new(),
        )
        .with_field("jobId", "job-42");

        // Act
        let value = serde_json::to_value(event.to_record().unwrap()).unwrap();

        // Assert
        assert_eq!(
            value,
            json!({
                "id": "evt-1",
                "type": "codegen.started",
                "occurredOn": "2026-01-15T10:00:00Z",
                "aggregateId": "job-42",
                "version": 1,
                "metadata": { "source": "cli" },
                "jobId": "job-42",
            })
        );
    }

    #[test]
    fn test_record_omits_absent_optional_fields() {
        let event = GenericEvent::new("test.event").unwrap();

        let value = serde_json::to_value(event.to_record().unwrap()).unwrap();

        let object = value.as_object().unwrap();
        assert!(!object.contains_key("aggregateId"));
        assert!(!object.contains_key("metadata"));
        assert_eq!(object["version"], json!(1));
    }

    #[test]
    fn test_record_parses_and_defaults_version() {
        let record = EventRecord::from_json(
            r#"{"id":"e1","type":"test.event","occurredOn":"2026-01-15T10:00:00.000Z","extra":true}"#,
        )
        .unwrap();

        assert_eq!(record.version, DEFAULT_EVENT_VERSION);
        assert_eq!(record.occurred_on, fixed_now());
        assert!(record.metadata.is_empty());
        assert_eq!(record.payload.get("extra"), Some(&json!(true)));
    }

    #[test]
    fn test_header_from_record_rejects_empty_type() {
        let mut record = GenericEvent::new("test.event").unwrap().to_record().unwrap();
        record.event_type = String::new();

        assert!(matches!(
            EventHeader::from_record(&record),
            Err(EventError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_header_from_record_rejects_zero_version_and_empty_id() {
        let valid = GenericEvent::new("test.event").unwrap().to_record().unwrap();
        let mut zero_version = valid.clone();
        zero_version.version = 0;
        let mut empty_id = valid;
        empty_id.id = String::new();

        match EventHeader::from_record(&zero_version) {
            Err(EventError::InvalidArgument(msg)) => assert!(msg.contains("version")),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
        match EventHeader::from_record(&empty_id) {
            Err(EventError::InvalidArgument(msg)) => assert!(msg.contains("id")),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn test_payload_field_shadowing_base_field_is_rejected() {
        for key in RESERVED_RECORD_KEYS {
            // Arrange
            let event = GenericEvent::new("test.event")
                .unwrap()
                .with_field(key, "shadow");

            // Act
            let result = event.to_record();

            // Assert
            match result {
                Err(EventError::InvalidArgument(msg)) => assert!(msg.contains(key)),
                other => panic!("expected InvalidArgument for {key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_to_json_refuses_hand_built_record_with_shadowing_payload() {
        let mut record = GenericEvent::new("test.event").unwrap().to_record().unwrap();
        record.payload.insert("type".to_owned(), json!("shadow"));

        assert!(matches!(
            record.to_json(),
            Err(EventError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_payload_with_near_miss_keys_round_trips() {
        let original = GenericEvent::new("test.event")
            .unwrap()
            .with_field("eventType", "x")
            .with_field("occurred_on", "y");

        let json = original.to_record().unwrap().to_json().unwrap();
        let restored = GenericEvent::from_record(&EventRecord::from_json(&json).unwrap()).unwrap();

        assert_eq!(restored, original);
    }

    #[test]
    fn test_generic_event_round_trips_through_record() {
        // Arrange
        let original = GenericEvent::from_parts(
            EventHeader::new("test.event")
                .unwrap()
                .with_aggregate_id("agg-1")
                .with_metadata_entry("traceId", "t-1"),
            Map::new(),
        )
        .with_field("count", 3);

        // Act
        let json = original.to_record().unwrap().to_json().unwrap();
        let restored = GenericEvent::from_record(&EventRecord::from_json(&json).unwrap()).unwrap();

        // Assert
        assert_eq!(restored, original);
    }

    #[test]
    fn test_decode_payload_reports_event_type_on_mismatch() {
        #[derive(Debug, Deserialize)]
        struct Expected {
            #[allow(dead_code)]
            job_id: String,
        }

        let record = GenericEvent::new("test.event").unwrap().to_record().unwrap();

        match record.decode_payload::<Expected>() {
            Err(EventError::Deserialization { event_type, .. }) => {
                assert_eq!(event_type, "test.event");
            }
            other => panic!("expected Deserialization, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_payload_rejects_non_objects() {
        assert!(matches!(
            encode_payload(&42),
            Err(EventError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_downcast_ref_recovers_concrete_kind() {
        let event: Box<dyn DomainEvent> = Box::new(GenericEvent::new("test.event").unwrap());

        assert!(event.downcast_ref::<GenericEvent>().is_some());
    }
}
