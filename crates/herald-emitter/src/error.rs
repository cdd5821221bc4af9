//! Emission error types.

use std::fmt;

use thiserror::Error;

/// Error type a listener may fail with.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a single listener invocation.
pub type ListenerResult = Result<(), ListenerError>;

/// Raised in place of a listener that panicked.
#[derive(Debug, Error)]
#[error("listener panicked: {message}")]
pub struct ListenerPanicked {
    /// The panic message, when it was a string.
    pub message: String,
}

/// One failed listener within an emission.
#[derive(Debug)]
pub struct ListenerFailure {
    /// The event name the listener was registered under.
    pub event: String,
    /// Position of the listener in registration order.
    pub index: usize,
    /// The error the listener returned.
    pub error: ListenerError,
}

impl fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "listener {} for event \"{}\": {}",
            self.index, self.event, self.error
        )
    }
}

/// Failure of an emission.
///
/// Every listener runs regardless of its siblings. A single failure is
/// reported as [`EmitError::Listener`] with the listener's own error as the
/// source; several failures are reported together as
/// [`EmitError::Aggregate`] in registration order.
#[derive(Debug, Error)]
pub enum EmitError {
    /// Exactly one listener failed.
    #[error("listener {index} for event \"{event}\" failed: {source}")]
    Listener {
        /// The event name the listener was registered under.
        event: String,
        /// Position of the listener in registration order.
        index: usize,
        /// The error the listener returned.
        #[source]
        source: ListenerError,
    },

    /// More than one listener failed.
    #[error("{}", describe_failures(.failures))]
    Aggregate {
        /// The event name that was emitted.
        event: String,
        /// Every failure, in registration order.
        failures: Vec<ListenerFailure>,
    },
}

impl EmitError {
    /// Builds the error for `failures`, or `None` when there were none.
    #[must_use]
    pub fn from_failures(event: &str, mut failures: Vec<ListenerFailure>) -> Option<Self> {
        match failures.len() {
            0 => None,
            1 => failures.pop().map(|failure| Self::Listener {
                event: failure.event,
                index: failure.index,
                source: failure.error,
            }),
            _ => Some(Self::Aggregate {
                event: event.to_owned(),
                failures,
            }),
        }
    }

    /// The event name that was emitted.
    #[must_use]
    pub fn event(&self) -> &str {
        match self {
            Self::Listener { event, .. } | Self::Aggregate { event, .. } => event,
        }
    }

    /// Number of listeners that failed.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        match self {
            Self::Listener { .. } => 1,
            Self::Aggregate { failures, .. } => failures.len(),
        }
    }

    /// Unpacks the individual failures.
    #[must_use]
    pub fn into_failures(self) -> Vec<ListenerFailure> {
        match self {
            Self::Listener {
                event,
                index,
                source,
            } => vec![ListenerFailure {
                event,
                index,
                error: source,
            }],
            Self::Aggregate { failures, .. } => failures,
        }
    }
}

fn describe_failures(failures: &[ListenerFailure]) -> String {
    let event = failures.first().map_or("", |f| f.event.as_str());
    let details: Vec<String> = failures.iter().map(ToString::to_string).collect();
    format!(
        "{} listeners for event \"{event}\" failed: {}",
        failures.len(),
        details.join("; ")
    )
}
