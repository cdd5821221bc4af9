//! Herald Emitter — typed publish/subscribe dispatch.
//!
//! A [`emitter::TypedEventEmitter`] keeps an ordered list of listeners per
//! event name and runs all of them on every emission, isolating failures
//! per listener. It knows nothing about domain events and can carry any
//! cloneable payload.

pub mod emitter;
pub mod error;
