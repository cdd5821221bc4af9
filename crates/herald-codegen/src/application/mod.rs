//! Application layer for the code generation context.

pub mod command_handlers;
