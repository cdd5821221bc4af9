//! Domain layer for the code generation context.

pub mod commands;
pub mod events;
