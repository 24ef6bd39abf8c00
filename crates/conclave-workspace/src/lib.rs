//! # conclave-workspace
//!
//! The shared file tree agents read and mutate.
//!
//! - [`WorkspaceStore`]: create/read/replace/list/delete of text files under one root
//! - [`LockManager`]: per-path advisory locks with owner identity and expiry
//! - [`GuardedWorkspace`]: store mutations wrapped in acquire/release of the path lock

#![deny(unsafe_code)]

pub mod errors;
pub mod guarded;
pub mod lock;
pub mod store;

pub use errors::{Result, WorkspaceError};
pub use guarded::GuardedWorkspace;
pub use lock::{FileLock, LockGuard, LockManager};
pub use store::{FileSnapshot, WorkspaceStore};
