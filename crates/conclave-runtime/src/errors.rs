//! Supervisor error types.
//!
//! Agent-level failures never surface here: they are folded back into the
//! agent's transcript or force that agent to complete. Only session control
//! operations can fail.

use conclave_workspace::WorkspaceError;
use thiserror::Error;

/// Errors from session control operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A session was started without a topic.
    #[error("a session topic is required")]
    MissingTopic,

    /// No active session has this id.
    #[error("session control not found: {id}")]
    SessionNotFound {
        /// The requested id.
        id: String,
    },

    /// A workspace maintenance operation failed.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}
