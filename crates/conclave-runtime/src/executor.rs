//! Tool executor: lookup → execute → exactly one result.

use std::sync::Arc;
use std::time::Instant;

use conclave_core::messages::ToolCall;
use conclave_core::tools::{ToolResult, error_result};
use conclave_tools::{AgentPort, ToolContext, ToolRegistry};
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// Execute one tool call on behalf of `agent`.
///
/// Never fails: an unknown tool or a tool error becomes a failed result the
/// agent can read.
#[instrument(skip_all, fields(tool_name = %call.name, tool_call_id = %call.id, role = %agent.role()))]
pub async fn execute_tool_call(call: &ToolCall, registry: &ToolRegistry, agent: Arc<dyn AgentPort>) -> ToolResult {
    let start = Instant::now();
    let Some(tool) = registry.get(&call.name) else {
        warn!("tool not found");
        return error_result(format!(
            "Tool not found: {}. Available tools: {}",
            call.name,
            registry.names().join(", ")
        ));
    };

    let ctx = ToolContext {
        tool_call_id: call.id.clone(),
        agent,
    };
    let result = match tool.execute(Value::Object(call.arguments.clone()), &ctx).await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "tool execution failed");
            error_result(e.to_string())
        }
    };
    debug!(
        is_error = result.is_error,
        elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "tool executed"
    );
    result
}
