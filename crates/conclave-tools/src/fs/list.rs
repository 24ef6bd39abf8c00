//! `listFiles`: lists files under a directory.

use std::sync::Arc;

use async_trait::async_trait;
use conclave_core::tools::{ToolDefinition, ToolParameterSchema, ToolResult, text_result};
use conclave_workspace::GuardedWorkspace;
use serde_json::{Value, json};

use crate::errors::ToolError;
use crate::traits::{ConclaveTool, ToolContext};
use crate::utils::validation::get_optional_string;
use crate::utils::workspace_errors::workspace_error_result;

/// Lists workspace files, recursively, as sorted root-relative paths.
pub struct ListFilesTool {
    workspace: Arc<GuardedWorkspace>,
}

impl ListFilesTool {
    /// Create the tool over `workspace`.
    pub fn new(workspace: Arc<GuardedWorkspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl ConclaveTool for ListFilesTool {
    fn name(&self) -> &str {
        "listFiles"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "listFiles".into(),
            description: "List every file in the shared workspace, or under a directory of it.".into(),
            parameters: ToolParameterSchema::object().string_property(
                "dir",
                "Workspace-relative directory (defaults to the workspace root)",
                false,
            ),
        }
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let dir = get_optional_string(&params, "dir").unwrap_or_default();

        let listed = self
            .workspace
            .store()
            .normalize(&dir)
            .and_then(|rel| self.workspace.list(&rel).map(|files| (rel, files)));
        match listed {
            Ok((rel, files)) => {
                let text = if files.is_empty() {
                    "No files.".to_owned()
                } else {
                    files.join("\n")
                };
                Ok(text_result(text, false).with_details(json!({
                    "fileEvent": "listed",
                    "dir": rel,
                    "count": files.len(),
                    "files": files,
                })))
            }
            Err(e) => Ok(workspace_error_result(&e)),
        }
    }
}
