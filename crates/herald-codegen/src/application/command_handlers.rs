//! Command handlers for the code generation context.
//!
//! Each handler builds the matching domain event and publishes it, waiting
//! for every subscriber before returning.

use herald_bus::error::BusError;
use herald_bus::publisher::EventPublisher;
use herald_core::clock::Clock;
use tracing::{info, instrument};

use crate::domain::commands::{CompleteCodegen, FailCodegen, StartCodegen};
use crate::domain::events::{
    CodegenCompleted, CodegenEvent, CodegenEventKind, CodegenFailed, CodegenStarted,
};

/// Metadata key under which the correlation ID is recorded.
pub const CORRELATION_ID_KEY: &str = "correlationId";

async fn announce(
    kind: CodegenEventKind,
    correlation_id: Option<&str>,
    clock: &dyn Clock,
    publisher: &dyn EventPublisher,
) -> Result<CodegenEvent, BusError> {
    let mut event = CodegenEvent::new(kind, clock)?;
    if let Some(correlation_id) = correlation_id {
        event = event.with_metadata_entry(CORRELATION_ID_KEY, correlation_id);
    }
    let outcome = publisher.publish(&event).await?;
    info!(job_id = %event.kind().job_id(), ?outcome, "codegen event published");
    Ok(event)
}

/// Handles the `StartCodegen` command: publishes `codegen.started`.
///
/// # Errors
///
/// Returns `BusError` if the event is invalid or a subscriber failed.
#[instrument(skip_all, fields(job_id = %command.job_id))]
pub async fn handle_start_codegen(
    command: &StartCodegen,
    clock: &dyn Clock,
    publisher: &dyn EventPublisher,
) -> Result<CodegenEvent, BusError> {
    let kind = CodegenEventKind::Started(CodegenStarted {
        job_id: command.job_id.clone(),
        template: command.template.clone(),
    });
    announce(kind, command.correlation_id.as_deref(), clock, publisher).await
}

/// Handles the `CompleteCodegen` command: publishes `codegen.completed`.
///
/// # Errors
///
/// Returns `BusError` if the event is invalid or a subscriber failed.
#[instrument(skip_all, fields(job_id = %command.job_id))]
pub async fn handle_complete_codegen(
    command: &CompleteCodegen,
    clock: &dyn Clock,
    publisher: &dyn EventPublisher,
) -> Result<CodegenEvent, BusError> {
    let kind = CodegenEventKind::Completed(CodegenCompleted {
        job_id: command.job_id.clone(),
        artifact_count: command.artifact_count,
    });
    announce(kind, command.correlation_id.as_deref(), clock, publisher).await
}

/// Handles the `FailCodegen` command: publishes `codegen.failed`.
///
/// # Errors
///
/// Returns `BusError` if the event is invalid or a subscriber failed.
#[instrument(skip_all, fields(job_id = %command.job_id))]
pub async fn handle_fail_codegen(
    command: &FailCodegen,
    clock: &dyn Clock,
    publisher: &dyn EventPublisher,
) -> Result<CodegenEvent, BusError> {
    let kind = CodegenEventKind::Failed(CodegenFailed {
        job_id: command.job_id.clone(),
        reason: command.reason.clone(),
    });
    announce(kind, command.correlation_id.as_deref(), clock, publisher).await
}
