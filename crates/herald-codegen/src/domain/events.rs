//! Domain events for the code generation context.

use std::any::Any;

use herald_core::clock::{Clock, SystemClock};
use herald_core::error::EventError;
use herald_core::event::{DomainEvent, EventHeader, EventRecord, FromRecord, encode_payload};
use herald_core::registry::EventRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Emitted when a code generation job starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodegenStarted {
    /// The job identifier.
    pub job_id: String,
    /// The template the job renders, if one was chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// Emitted when a code generation job finishes successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodegenCompleted {
    /// The job identifier.
    pub job_id: String,
    /// Number of files the job produced.
    pub artifact_count: u32,
}

/// Emitted when a code generation job fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodegenFailed {
    /// The job identifier.
    pub job_id: String,
    /// Why the job failed.
    pub reason: String,
}

/// Event type identifier for [`CodegenStarted`].
pub const CODEGEN_STARTED_EVENT_TYPE: &str = "codegen.started";

/// Event type identifier for [`CodegenCompleted`].
pub const CODEGEN_COMPLETED_EVENT_TYPE: &str = "codegen.completed";

/// Event type identifier for [`CodegenFailed`].
pub const CODEGEN_FAILED_EVENT_TYPE: &str = "codegen.failed";

/// Every event type owned by this context.
pub const CODEGEN_EVENT_TYPES: [&str; 3] = [
    CODEGEN_STARTED_EVENT_TYPE,
    CODEGEN_COMPLETED_EVENT_TYPE,
    CODEGEN_FAILED_EVENT_TYPE,
];

/// Event payload variants for the code generation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodegenEventKind {
    /// A job has started.
    Started(CodegenStarted),
    /// A job has completed.
    Completed(CodegenCompleted),
    /// A job has failed.
    Failed(CodegenFailed),
}

impl CodegenEventKind {
    /// The event type this variant is published under.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started(_) => CODEGEN_STARTED_EVENT_TYPE,
            Self::Completed(_) => CODEGEN_COMPLETED_EVENT_TYPE,
            Self::Failed(_) => CODEGEN_FAILED_EVENT_TYPE,
        }
    }

    /// The job the event concerns.
    #[must_use]
    pub fn job_id(&self) -> &str {
        match self {
            Self::Started(e) => &e.job_id,
            Self::Completed(e) => &e.job_id,
            Self::Failed(e) => &e.job_id,
        }
    }
}

/// Domain event envelope for the code generation context.
///
/// The header's type always matches the payload variant and its aggregate
/// is the job id.
#[derive(Debug, Clone, PartialEq)]
pub struct CodegenEvent {
    header: EventHeader,
    kind: CodegenEventKind,
}

impl CodegenEvent {
    /// Wraps `kind` in a fresh header stamped by `clock`.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidArgument` if the job id is empty.
    pub fn new(kind: CodegenEventKind, clock: &dyn Clock) -> Result<Self, EventError> {
        if kind.job_id().is_empty() {
            return Err(EventError::InvalidArgument(
                "codegen job id must not be empty".to_owned(),
            ));
        }
        let header =
            EventHeader::new_with_clock(kind.event_type(), clock)?.with_aggregate_id(kind.job_id());
        Ok(Self { header, kind })
    }

    /// A `codegen.started` event stamped with the system time.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidArgument` if `job_id` is empty.
    pub fn started(job_id: impl Into<String>, template: Option<String>) -> Result<Self, EventError> {
        Self::new(
            CodegenEventKind::Started(CodegenStarted {
                job_id: job_id.into(),
                template,
            }),
            &SystemClock,
        )
    }

    /// A `codegen.completed` event stamped with the system time.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidArgument` if `job_id` is empty.
    pub fn completed(job_id: impl Into<String>, artifact_count: u32) -> Result<Self, EventError> {
        Self::new(
            CodegenEventKind::Completed(CodegenCompleted {
                job_id: job_id.into(),
                artifact_count,
            }),
            &SystemClock,
        )
    }

    /// A `codegen.failed` event stamped with the system time.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidArgument` if `job_id` is empty.
    pub fn failed(job_id: impl Into<String>, reason: impl Into<String>) -> Result<Self, EventError> {
        Self::new(
            CodegenEventKind::Failed(CodegenFailed {
                job_id: job_id.into(),
                reason: reason.into(),
            }),
            &SystemClock,
        )
    }

    /// Attaches a metadata entry, such as a correlation id.
    #[must_use]
    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.header = self.header.with_metadata_entry(key, value);
        self
    }

    /// Event-specific payload.
    #[must_use]
    pub fn kind(&self) -> &CodegenEventKind {
        &self.kind
    }
}

impl DomainEvent for CodegenEvent {
    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn payload(&self) -> Result<Map<String, Value>, EventError> {
        match &self.kind {
            CodegenEventKind::Started(e) => encode_payload(e),
            CodegenEventKind::Completed(e) => encode_payload(e),
            CodegenEventKind::Failed(e) => encode_payload(e),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl FromRecord for CodegenEvent {
    fn from_record(record: &EventRecord) -> Result<Self, EventError> {
        let kind = match record.event_type.as_str() {
            CODEGEN_STARTED_EVENT_TYPE => CodegenEventKind::Started(record.decode_payload()?),
            CODEGEN_COMPLETED_EVENT_TYPE => CodegenEventKind::Completed(record.decode_payload()?),
            CODEGEN_FAILED_EVENT_TYPE => CodegenEventKind::Failed(record.decode_payload()?),
            other => {
                return Err(EventError::Deserialization {
                    event_type: other.to_owned(),
                    message: "not a codegen event type".to_owned(),
                });
            }
        };
        Ok(Self {
            header: EventHeader::from_record(record)?,
            kind,
        })
    }
}

/// Registers the deserializers for every codegen event type on `registry`.
pub fn register_codegen_events(registry: &EventRegistry) {
    for event_type in CODEGEN_EVENT_TYPES {
        registry.register_event::<CodegenEvent>(event_type);
    }
    tracing::debug!(count = CODEGEN_EVENT_TYPES.len(), "registered codegen event deserializers");
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use herald_test_support::FixedClock;
    use serde_json::json;

    use super::*;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    #[test]
    fn test_started_event_carries_job_as_aggregate() {
        let event = CodegenEvent::started("abc", None).unwrap();

        assert_eq!(event.event_type(), "codegen.started");
        assert_eq!(event.header().aggregate_id(), Some("abc"));
        assert_eq!(event.kind().job_id(), "abc");
    }

    #[test]
    fn test_empty_job_id_is_rejected() {
        assert!(matches!(
            CodegenEvent::failed("", "boom"),
            Err(EventError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_record_flattens_typed_fields() {
        // Arrange
        let event = CodegenEvent::new(
            CodegenEventKind::Completed(CodegenCompleted {
                job_id: "abc".to_owned(),
                artifact_count: 4,
            }),
            &clock(),
        )
        .unwrap()
        .with_metadata_entry("correlationId", "c-1");

        // Act
        let mut value = serde_json::to_value(event.to_record().unwrap()).unwrap();
        value.as_object_mut().unwrap().remove("id");

        // Assert
        assert_eq!(
            value,
            json!({
                "type": "codegen.completed",
                "occurredOn": "2026-01-15T10:00:00Z",
                "aggregateId": "abc",
                "version": 1,
                "metadata": { "correlationId": "c-1" },
                "jobId": "abc",
                "artifactCount": 4,
            })
        );
    }

    #[test]
    fn test_every_kind_round_trips_through_registry() {
        // Arrange
        let registry = EventRegistry::new();
        register_codegen_events(&registry);
        let events = vec![
            CodegenEvent::started("abc", Some("rust-service".to_owned())).unwrap(),
            CodegenEvent::completed("abc", 12).unwrap(),
            CodegenEvent::failed("abc", "template missing").unwrap(),
        ];

        for original in events {
            // Act
            let json = original.to_record().unwrap().to_json().unwrap();
            let restored = registry.deserialize_json(&json).unwrap();

            // Assert
            let restored = restored.downcast_ref::<CodegenEvent>().unwrap();
            assert_eq!(restored, &original);
        }
    }

    #[test]
    fn test_from_record_rejects_foreign_type() {
        let mut record = CodegenEvent::started("abc", None)
            .unwrap()
            .to_record()
            .unwrap();
        record.event_type = "billing.charged".to_owned();

        match CodegenEvent::from_record(&record) {
            Err(EventError::Deserialization { event_type, .. }) => {
                assert_eq!(event_type, "billing.charged");
            }
            other => panic!("expected Deserialization, got {other:?}"),
        }
    }

    #[test]
    fn test_from_record_rejects_missing_fields() {
        let mut record = CodegenEvent::completed("abc", 1)
            .unwrap()
            .to_record()
            .unwrap();
        record.payload.remove("artifactCount");

        assert!(matches!(
            CodegenEvent::from_record(&record),
            Err(EventError::Deserialization { .. })
        ));
    }
}
