//! Workspace error types.
//!
//! Every variant carries a remediation hint (see [`WorkspaceError::guidance`])
//! that tools attach to failed results so an agent can correct course.

use std::io;

use thiserror::Error;

/// Errors from workspace store and lock operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Target of a create already exists.
    #[error("file already exists: {path}")]
    AlreadyExists {
        /// Workspace-relative path.
        path: String,
    },

    /// Target does not exist.
    #[error("file not found: {path}")]
    NotFound {
        /// Workspace-relative path.
        path: String,
    },

    /// The text to replace is not in the file.
    #[error("text to replace was not found in {path}")]
    NoMatch {
        /// Workspace-relative path.
        path: String,
    },

    /// A file operation named a directory.
    #[error("is a directory: {path}")]
    IsDirectory {
        /// Workspace-relative path.
        path: String,
    },

    /// The path resolves outside the workspace root.
    #[error("access denied: {path} is outside the workspace")]
    AccessDenied {
        /// Path as given.
        path: String,
    },

    /// Another owner holds a live lock on the path.
    #[error("{path} is locked by {owner}")]
    Locked {
        /// Workspace-relative path.
        path: String,
        /// Current lock owner.
        owner: String,
    },

    /// Underlying filesystem failure.
    #[error("io error on {path}: {source}")]
    Io {
        /// Workspace-relative path.
        path: String,
        /// The I/O error.
        #[source]
        source: io::Error,
    },
}

impl WorkspaceError {
    pub(crate) fn io(path: &str, source: io::Error) -> Self {
        Self::Io {
            path: path.to_owned(),
            source,
        }
    }

    /// Short machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AlreadyExists { .. } => "already_exists",
            Self::NotFound { .. } => "not_found",
            Self::NoMatch { .. } => "no_match",
            Self::IsDirectory { .. } => "is_directory",
            Self::AccessDenied { .. } => "access_denied",
            Self::Locked { .. } => "locked",
            Self::Io { .. } => "io",
        }
    }

    /// What an agent should do next.
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::AlreadyExists { .. } => {
                "Use replaceInFile to change an existing file instead of createFile."
            }
            Self::NotFound { .. } => {
                "Use listFiles to see which files exist, or createFile to make it."
            }
            Self::NoMatch { .. } => {
                "Use readFile first and copy the exact text you want to replace, including whitespace."
            }
            Self::IsDirectory { .. } => "Operate on the individual files inside it instead.",
            Self::AccessDenied { .. } => {
                "Use a relative path inside the workspace, without '..' or a leading '/'."
            }
            Self::Locked { .. } => {
                "Another agent is editing this file. Retry shortly or work on a different file."
            }
            Self::Io { .. } => "Retry the operation; if it keeps failing, tell your peers.",
        }
    }
}

/// Result type for workspace operations.
pub type Result<T> = std::result::Result<T, WorkspaceError>;
