//! Commands for the code generation context.

/// Command to announce that a code generation job has started.
#[derive(Debug, Clone)]
pub struct StartCodegen {
    /// The job identifier.
    pub job_id: String,
    /// The template the job renders, if one was chosen.
    pub template: Option<String>,
    /// Correlation ID carried into the event metadata.
    pub correlation_id: Option<String>,
}

/// Command to announce that a code generation job has completed.
#[derive(Debug, Clone)]
pub struct CompleteCodegen {
    /// The job identifier.
    pub job_id: String,
    /// Number of files the job produced.
    pub artifact_count: u32,
    /// Correlation ID carried into the event metadata.
    pub correlation_id: Option<String>,
}

/// Command to announce that a code generation job has failed.
#[derive(Debug, Clone)]
pub struct FailCodegen {
    /// The job identifier.
    pub job_id: String,
    /// Why the job failed.
    pub reason: String,
    /// Correlation ID carried into the event metadata.
    pub correlation_id: Option<String>,
}
