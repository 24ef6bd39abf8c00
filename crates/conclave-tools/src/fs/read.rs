//! `readFile`: returns the committed content of a file.

use std::sync::Arc;

use async_trait::async_trait;
use conclave_core::tools::{ToolDefinition, ToolParameterSchema, ToolResult, text_result};
use conclave_workspace::GuardedWorkspace;
use serde_json::{Value, json};

use crate::errors::ToolError;
use crate::traits::{ConclaveTool, ToolContext};
use crate::utils::validation::validate_required_string;
use crate::utils::workspace_errors::workspace_error_result;

/// Reads a workspace file. Reads take no lock.
pub struct ReadFileTool {
    workspace: Arc<GuardedWorkspace>,
}

impl ReadFileTool {
    /// Create the tool over `workspace`.
    pub fn new(workspace: Arc<GuardedWorkspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl ConclaveTool for ReadFileTool {
    fn name(&self) -> &str {
        "readFile"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "readFile".into(),
            description: "Read the full content of a file in the shared workspace.".into(),
            parameters: ToolParameterSchema::object().string_property(
                "path",
                "Workspace-relative path of the file",
                true,
            ),
        }
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let path = validate_required_string(&params, "path", "path of the file to read")?;

        let read = self
            .workspace
            .store()
            .normalize(&path)
            .and_then(|rel| self.workspace.read(&rel).map(|content| (rel, content)));
        match read {
            Ok((rel, content)) => {
                let bytes = content.len();
                Ok(text_result(content, false).with_details(json!({
                    "path": rel,
                    "bytes": bytes,
                })))
            }
            Err(e) => Ok(workspace_error_result(&e)),
        }
    }
}
