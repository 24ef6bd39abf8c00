//! # conclave-tools
//!
//! The fixed tool set agents can invoke:
//!
//! - **Workspace**: `createFile`, `readFile`, `replaceInFile`, `listFiles`, `deleteFile`
//! - **Communication**: `talk` (queued message to a peer), `readMessage` (LIFO inbox drain)
//!
//! Tools reach the invoking agent through the [`traits::AgentPort`] trait,
//! which the runtime implements.

#![deny(unsafe_code)]

pub mod communication;
pub mod errors;
pub mod fs;
pub mod registry;
pub mod traits;
pub mod utils;

#[cfg(test)]
pub(crate) mod testutil;

pub use errors::ToolError;
pub use registry::ToolRegistry;
pub use traits::{AgentPort, ConclaveTool, ToolContext};
