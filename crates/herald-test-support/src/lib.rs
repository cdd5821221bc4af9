//! Shared test doubles and utilities for the Herald event bus.

mod clock;
mod logging;
mod probe;
mod publisher;

pub use clock::{FixedClock, ManualClock};
pub use logging::init_test_tracing;
pub use probe::{CallLog, Counter};
pub use publisher::{FailingPublisher, RecordingPublisher};
