//! Core completion service abstraction.

use async_trait::async_trait;
use conclave_core::messages::{Message, ToolCall};
use conclave_core::roles::AgentRole;
use conclave_core::tools::ToolDefinition;
use serde::{Deserialize, Serialize};

/// Result type alias for completion calls.
pub type CompletionResult<T> = Result<T, CompletionError>;

/// Errors from a completion call. Any of these ends the calling agent's turn.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Authentication failed.
    #[error("Auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// The service returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Whether this error can be retried.
        retryable: bool,
    },

    /// Anything else.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl CompletionError {
    /// Whether a later identical request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                    })
            }
            Self::Api { retryable, .. } => *retryable,
            Self::Auth { .. } | Self::Json(_) | Self::Other { .. } => false,
        }
    }

    /// Error category string for logs.
    pub fn category(&self) -> &str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) => "parse",
            Self::Auth { .. } => "auth",
            Self::Api { .. } => "api",
            Self::Other { .. } => "unknown",
        }
    }
}

/// Whether the service may answer in text or must call a tool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// Free choice between text and tools.
    #[default]
    Auto,
    /// At least one tool call is required.
    Any,
}

/// Everything one completion call needs.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    /// Agent making the call.
    pub agent: AgentRole,
    /// System prompt.
    pub system_prompt: String,
    /// Ordered transcript, already repaired.
    pub messages: Vec<Message>,
    /// Tool schema.
    pub tools: Vec<ToolDefinition>,
    /// Tool choice control.
    pub tool_choice: ToolChoice,
}

/// One assistant turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Free text, if any.
    pub text: Option<String>,
    /// Tool invocations, in order.
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    /// A text-only completion.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Whether the turn invoked any tool.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A language-model completion backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Produce the next assistant turn.
    async fn complete(&self, request: &CompletionRequest) -> CompletionResult<Completion>;
}
