//! Core tool trait and the agent-facing dependency injection seam.

use std::sync::Arc;

use async_trait::async_trait;
use conclave_core::messages::AgentMessage;
use conclave_core::roles::AgentRole;
use conclave_core::tools::{ToolDefinition, ToolResult};
use serde_json::Value;

use crate::errors::ToolError;

/// The invoking agent, as seen by tools.
///
/// Implemented by the runtime agent. Tools never hold an agent directly.
pub trait AgentPort: Send + Sync {
    /// Role of the invoking agent.
    fn role(&self) -> AgentRole;

    /// Identity recorded on workspace locks taken by this agent.
    ///
    /// Must differ between sessions sharing a workspace; defaults to the role name.
    fn lock_owner(&self) -> String {
        self.role().as_str().to_owned()
    }

    /// Other participants in the session.
    fn peers(&self) -> Vec<AgentRole>;

    /// Talk budget left.
    fn talk_budget(&self) -> u32;

    /// Spend one unit of talk budget, returning what is left, or `None` if none was left.
    fn spend_talk_budget(&self) -> Option<u32>;

    /// Route a queued message from this agent to `to`.
    fn send_queued(&self, to: AgentRole, content: &str) -> Result<(), ToolError>;

    /// Pop the most recently queued inbox message.
    fn pop_inbox(&self) -> Option<AgentMessage>;

    /// Messages still waiting in the inbox.
    fn inbox_len(&self) -> usize;
}

/// Execution context passed to every tool invocation.
#[derive(Clone)]
pub struct ToolContext {
    /// Correlation id of this invocation.
    pub tool_call_id: String,
    /// The invoking agent.
    pub agent: Arc<dyn AgentPort>,
}

impl ToolContext {
    /// Lock owner identity of the invoking agent.
    pub fn owner(&self) -> String {
        self.agent.lock_owner()
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("tool_call_id", &self.tool_call_id)
            .field("agent", &self.agent.role())
            .finish()
    }
}

/// The trait every tool implements.
#[async_trait]
pub trait ConclaveTool: Send + Sync {
    /// Tool name, exactly as exchanged with the completion service.
    fn name(&self) -> &str;

    /// Schema sent to the completion service.
    fn definition(&self) -> ToolDefinition;

    /// Execute with JSON arguments.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError>;
}
