//! `deleteFile`: removes a file.

use std::sync::Arc;

use async_trait::async_trait;
use conclave_core::tools::{ToolDefinition, ToolParameterSchema, ToolResult, text_result};
use conclave_workspace::GuardedWorkspace;
use serde_json::{Value, json};

use crate::errors::ToolError;
use crate::traits::{ConclaveTool, ToolContext};
use crate::utils::validation::validate_required_string;
use crate::utils::workspace_errors::workspace_error_result;

/// Deletes a workspace file.
pub struct DeleteFileTool {
    workspace: Arc<GuardedWorkspace>,
}

impl DeleteFileTool {
    /// Create the tool over `workspace`.
    pub fn new(workspace: Arc<GuardedWorkspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl ConclaveTool for DeleteFileTool {
    fn name(&self) -> &str {
        "deleteFile"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "deleteFile".into(),
            description: "Delete a file from the shared workspace.".into(),
            parameters: ToolParameterSchema::object().string_property(
                "path",
                "Workspace-relative path of the file",
                true,
            ),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let path = validate_required_string(&params, "path", "path of the file to delete")?;

        match self.workspace.delete(&ctx.owner(), &path) {
            Ok(rel) => Ok(text_result(format!("Deleted {rel}"), false).with_details(json!({
                "fileEvent": "deleted",
                "path": rel,
            }))),
            Err(e) => Ok(workspace_error_result(&e)),
        }
    }
}
