//! Herald Core — domain events and their reconstruction.
//!
//! This crate defines the canonical event record, the `DomainEvent` trait
//! that concrete event kinds implement, and the registry that turns a
//! serialized record back into a typed event. It contains no transport code.

pub mod clock;
pub mod error;
pub mod event;
pub mod registry;
