//! Event bus error types.

use herald_core::error::EventError;
use herald_emitter::error::EmitError;
use thiserror::Error;

/// Failure of a publish.
#[derive(Debug, Error)]
pub enum BusError {
    /// The event could not be turned into a valid record.
    #[error(transparent)]
    Event(#[from] EventError),

    /// One or more subscribers failed while handling the event.
    #[error(transparent)]
    Delivery(#[from] EmitError),
}
