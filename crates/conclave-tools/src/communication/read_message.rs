//! `readMessage`: drains one message from the inbox, newest first.

use async_trait::async_trait;
use conclave_core::tools::{ToolDefinition, ToolParameterSchema, ToolResult, text_result};
use serde_json::{Value, json};

use crate::errors::ToolError;
use crate::traits::{ConclaveTool, ToolContext};

/// Pops the most recently queued inbox message into the transcript.
pub struct ReadMessageTool;

#[async_trait]
impl ConclaveTool for ReadMessageTool {
    fn name(&self) -> &str {
        "readMessage"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "readMessage".into(),
            description: "Read the newest unread message in your inbox.".into(),
            parameters: ToolParameterSchema::object(),
        }
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let Some(message) = ctx.agent.pop_inbox() else {
            return Ok(text_result("Your inbox is empty.", false).with_details(json!({
                "remaining": 0,
            })));
        };
        let remaining = ctx.agent.inbox_len();
        Ok(text_result(
            format!(
                "Message from {} ({remaining} more in inbox):\n{}",
                message.from, message.content
            ),
            false,
        )
        .with_details(json!({
            "from": message.from,
            "remaining": remaining,
        })))
    }
}
