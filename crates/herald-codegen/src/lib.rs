//! Herald — code generation job events.
//!
//! The bounded context that announces the lifecycle of a code generation
//! job (`codegen.started`, `codegen.completed`, `codegen.failed`) on the
//! event bus and teaches the registry how to rebuild those events.

pub mod application;
pub mod domain;
