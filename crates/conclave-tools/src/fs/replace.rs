//! `replaceInFile`: replaces the first occurrence of a text in a file.

use std::sync::Arc;

use async_trait::async_trait;
use conclave_core::tools::{ToolDefinition, ToolParameterSchema, ToolResult, text_result};
use conclave_workspace::GuardedWorkspace;
use serde_json::{Value, json};

use crate::errors::ToolError;
use crate::traits::{ConclaveTool, ToolContext};
use crate::utils::validation::{validate_required_string, validate_string};
use crate::utils::workspace_errors::workspace_error_result;

/// Edits an existing workspace file in place.
pub struct ReplaceInFileTool {
    workspace: Arc<GuardedWorkspace>,
}

impl ReplaceInFileTool {
    /// Create the tool over `workspace`.
    pub fn new(workspace: Arc<GuardedWorkspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl ConclaveTool for ReplaceInFileTool {
    fn name(&self) -> &str {
        "replaceInFile"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "replaceInFile".into(),
            description: "Replace the first occurrence of oldText with newText in an existing file. oldText must match exactly; use readFile first.".into(),
            parameters: ToolParameterSchema::object()
                .string_property("path", "Workspace-relative path of the file", true)
                .string_property("oldText", "Exact text to replace", true)
                .string_property("newText", "Replacement text (may be empty)", true),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let path = validate_required_string(&params, "path", "path of the file to edit")?;
        let old_text = validate_string(&params, "oldText", "exact text to replace")?;
        let new_text = validate_string(&params, "newText", "replacement text")?;

        match self
            .workspace
            .replace(&ctx.owner(), &path, &old_text, &new_text)
        {
            Ok(rel) => Ok(text_result(format!("Updated {rel}"), false).with_details(json!({
                "fileEvent": "modified",
                "path": rel,
            }))),
            Err(e) => Ok(workspace_error_result(&e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockAgent, make_ctx, workspace};
    use conclave_core::roles::AgentRole;

    #[tokio::test]
    async fn replaces_first_occurrence_only() {
        let (_dir, ws) = workspace();
        let _ = ws.create("backend", "a.txt", "port=1 port=1").unwrap();
        let tool = ReplaceInFileTool::new(Arc::clone(&ws));
        let agent = MockAgent::new(AgentRole::Devops, 1);
        let result = tool
            .execute(
                json!({"path": "a.txt", "oldText": "port=1", "newText": "port=2"}),
                &make_ctx(&agent),
            )
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.details.unwrap()["fileEvent"], "modified");
        assert_eq!(ws.read("a.txt").unwrap(), "port=2 port=1");
    }

    #[tokio::test]
    async fn absent_text_leaves_file_untouched() {
        let (_dir, ws) = workspace();
        let _ = ws.create("backend", "a.txt", "hello").unwrap();
        let tool = ReplaceInFileTool::new(Arc::clone(&ws));
        let agent = MockAgent::new(AgentRole::Devops, 1);
        let result = tool
            .execute(
                json!({"path": "a.txt", "oldText": "bye", "newText": "x"}),
                &make_ctx(&agent),
            )
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("readFile"));
        assert_eq!(ws.read("a.txt").unwrap(), "hello");
    }

    #[tokio::test]
    async fn locked_by_peer() {
        let (_dir, ws) = workspace();
        let _ = ws.create("backend", "a.txt", "hello").unwrap();
        ws.locks().acquire("a.txt", "backend").unwrap();
        let tool = ReplaceInFileTool::new(Arc::clone(&ws));
        let agent = MockAgent::new(AgentRole::Devops, 1);
        let result = tool
            .execute(
                json!({"path": "a.txt", "oldText": "hello", "newText": "x"}),
                &make_ctx(&agent),
            )
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(result.details.unwrap()["error"], "locked");
        assert_eq!(ws.read("a.txt").unwrap(), "hello");
    }

    #[tokio::test]
    async fn empty_new_text_deletes_span() {
        let (_dir, ws) = workspace();
        let _ = ws.create("backend", "a.txt", "keep-drop").unwrap();
        let tool = ReplaceInFileTool::new(Arc::clone(&ws));
        let agent = MockAgent::new(AgentRole::Devops, 1);
        let _ = tool
            .execute(
                json!({"path": "a.txt", "oldText": "-drop", "newText": ""}),
                &make_ctx(&agent),
            )
            .await
            .unwrap();
        assert_eq!(ws.read("a.txt").unwrap(), "keep");
    }
}
