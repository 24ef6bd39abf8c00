//! # conclave-core
//!
//! Foundation types shared by every Conclave crate:
//!
//! - **IDs**: the session id newtype
//! - **Roles**: the fixed agent roster and per-agent turn state
//! - **Messages**: transcript entries and inter-agent messages
//! - **Tools**: tool schemas and execution results
//! - **Events**: the session broadcast vocabulary
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod logging;
pub mod messages;
pub mod roles;
pub mod tools;
