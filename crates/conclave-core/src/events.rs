//! Session broadcast events.
//!
//! [`SessionEvent`] is the push vocabulary exposed to external observers of
//! a session (CLI, viewers). Events are emitted in causal order; observers
//! joining late see only subsequent events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::roles::{AgentRole, AgentState, Sender};

/// Common fields for all session events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvent {
    /// Session this event belongs to.
    pub session_id: String,
    /// ISO 8601 timestamp.
    pub timestamp: String,
}

impl BaseEvent {
    /// Create a new base event with the current UTC timestamp.
    #[must_use]
    pub fn now(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Lifecycle status of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Agents are still working.
    Active,
    /// Every agent reported completion.
    Complete,
    /// The overall deadline elapsed first.
    Timeout,
    /// Cancelled from outside.
    Stopped,
}

impl SessionStatus {
    /// Whether the session has resolved.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Complete => "complete",
            Self::Timeout => "timeout",
            Self::Stopped => "stopped",
        })
    }
}

/// Events pushed to session observers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A session began.
    SessionStarted {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Topic every agent was seeded with.
        topic: String,
        /// Participating roles.
        roles: Vec<AgentRole>,
    },

    /// An agent changed turn state.
    AgentStatus {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Agent.
        role: AgentRole,
        /// New state.
        status: AgentState,
    },

    /// One agent talked to another.
    AgentMessage {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Sender.
        from: Sender,
        /// Recipient.
        to: AgentRole,
        /// Message body.
        content: String,
    },

    /// An agent invoked a tool.
    ToolCall {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Invoking agent.
        role: AgentRole,
        /// Correlation id.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Tool name.
        #[serde(rename = "toolName")]
        tool_name: String,
        /// Tool arguments.
        arguments: Value,
    },

    /// A tool invocation succeeded.
    ToolResult {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Invoking agent.
        role: AgentRole,
        /// Correlation id.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Tool name.
        #[serde(rename = "toolName")]
        tool_name: String,
        /// Result text.
        content: String,
    },

    /// A tool invocation failed, or its result was synthesized by protocol repair.
    ToolError {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Invoking agent.
        role: AgentRole,
        /// Correlation id.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Tool name, when known.
        #[serde(rename = "toolName")]
        tool_name: String,
        /// Failure text.
        error: String,
        /// True when no real result existed and one was synthesized.
        #[serde(default)]
        synthetic: bool,
    },

    /// A workspace file was created.
    FileCreated {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Acting agent.
        role: AgentRole,
        /// Workspace-relative path.
        path: String,
    },

    /// A workspace file was modified.
    FileModified {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Acting agent.
        role: AgentRole,
        /// Workspace-relative path.
        path: String,
    },

    /// A workspace file was deleted.
    FileDeleted {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Acting agent.
        role: AgentRole,
        /// Workspace-relative path.
        path: String,
    },

    /// An agent listed a workspace directory.
    FileListed {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Acting agent.
        role: AgentRole,
        /// Listed directory (empty for the root).
        dir: String,
        /// Number of files found.
        count: usize,
    },

    /// A queued message landed in an agent's inbox.
    InboxReceived {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Recipient.
        role: AgentRole,
        /// Sender.
        from: Sender,
        /// Inbox size after delivery.
        pending: usize,
    },

    /// An agent drained one message from its inbox.
    InboxRead {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Reader.
        role: AgentRole,
        /// Sender of the drained message.
        from: Sender,
        /// Inbox size after the read.
        remaining: usize,
    },

    /// The session resolved.
    SessionComplete {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Terminal status.
        status: SessionStatus,
    },
}

impl SessionEvent {
    /// Base fields shared by every event.
    pub fn base(&self) -> &BaseEvent {
        match self {
            Self::SessionStarted { base, .. }
            | Self::AgentStatus { base, .. }
            | Self::AgentMessage { base, .. }
            | Self::ToolCall { base, .. }
            | Self::ToolResult { base, .. }
            | Self::ToolError { base, .. }
            | Self::FileCreated { base, .. }
            | Self::FileModified { base, .. }
            | Self::FileDeleted { base, .. }
            | Self::FileListed { base, .. }
            | Self::InboxReceived { base, .. }
            | Self::InboxRead { base, .. }
            | Self::SessionComplete { base, .. } => base,
        }
    }

    /// Session id.
    pub fn session_id(&self) -> &str {
        &self.base().session_id
    }

    /// Wire name of the event kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::AgentStatus { .. } => "agent_status",
            Self::AgentMessage { .. } => "agent_message",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::ToolError { .. } => "tool_error",
            Self::FileCreated { .. } => "file_created",
            Self::FileModified { .. } => "file_modified",
            Self::FileDeleted { .. } => "file_deleted",
            Self::FileListed { .. } => "file_listed",
            Self::InboxReceived { .. } => "inbox_received",
            Self::InboxRead { .. } => "inbox_read",
            Self::SessionComplete { .. } => "session_complete",
        }
    }
}
