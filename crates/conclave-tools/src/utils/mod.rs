//! Shared helpers for tool implementations.

pub mod validation;
pub mod workspace_errors;
