//! Tool error types.
//!
//! A tool returning `Err` is not fatal: the executor turns the error's
//! display text into a failed tool result for the agent to read.

use conclave_core::roles::AgentRole;
use conclave_workspace::WorkspaceError;
use thiserror::Error;

/// Errors that can occur during tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments were malformed; the message says how to fix them.
    #[error("{message}")]
    Validation {
        /// What was wrong with the arguments.
        message: String,
    },

    /// A workspace operation failed.
    #[error("{0}")]
    Workspace(#[from] WorkspaceError),

    /// The sender has no talk budget left.
    #[error("talk budget exhausted for {role}: no further messages can be sent")]
    QuotaExhausted {
        /// Sending agent.
        role: AgentRole,
    },

    /// The talk target is not a session participant.
    #[error("unknown talk target: {target}")]
    UnknownTarget {
        /// Target as given.
        target: String,
    },
}
