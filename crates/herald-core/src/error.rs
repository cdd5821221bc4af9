//! Event model error types.

use thiserror::Error;

/// Errors raised while constructing, serializing or reconstructing events.
#[derive(Debug, Error)]
pub enum EventError {
    /// Malformed construction input, such as an empty event type.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No deserializer is registered for the record's event type.
    #[error(
        "No deserializer registered for event type \"{event_type}\". Register one via EventRegistry::get_instance().register(\"{event_type}\", ...)"
    )]
    DeserializerNotFound {
        /// The event type that had no registered deserializer.
        event_type: String,
    },

    /// A record could not be converted to or from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record was structurally valid JSON but did not describe the
    /// expected event.
    #[error("deserialization error for event type \"{event_type}\": {message}")]
    Deserialization {
        /// The event type being reconstructed.
        event_type: String,
        /// What was wrong with the record.
        message: String,
    },
}
