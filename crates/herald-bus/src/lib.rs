//! Herald Bus — domain-level publish/subscribe.
//!
//! Composes a [`herald_emitter::emitter::TypedEventEmitter`] carrying
//! canonical event records with an optional cache that suppresses
//! redundant publishes.

pub mod bus;
pub mod cache;
pub mod config;
pub mod error;
pub mod publisher;
