//! `createFile`: creates a new file, refusing to overwrite.

use std::sync::Arc;

use async_trait::async_trait;
use conclave_core::tools::{ToolDefinition, ToolParameterSchema, ToolResult, text_result};
use conclave_workspace::GuardedWorkspace;
use serde_json::{Value, json};

use crate::errors::ToolError;
use crate::traits::{ConclaveTool, ToolContext};
use crate::utils::validation::{validate_required_string, validate_string};
use crate::utils::workspace_errors::workspace_error_result;

/// Creates a new workspace file.
pub struct CreateFileTool {
    workspace: Arc<GuardedWorkspace>,
}

impl CreateFileTool {
    /// Create the tool over `workspace`.
    pub fn new(workspace: Arc<GuardedWorkspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl ConclaveTool for CreateFileTool {
    fn name(&self) -> &str {
        "createFile"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "createFile".into(),
            description: "Create a new file in the shared workspace. Fails if the file already exists; use replaceInFile to change existing files.".into(),
            parameters: ToolParameterSchema::object()
                .string_property("path", "Workspace-relative path of the new file", true)
                .string_property("content", "Full content of the new file", true),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let path = validate_required_string(&params, "path", "path of the file to create")?;
        let content = validate_string(&params, "content", "content of the file")?;

        match self.workspace.create(&ctx.owner(), &path, &content) {
            Ok(rel) => Ok(text_result(
                format!("Created {rel} ({} bytes)", content.len()),
                false,
            )
            .with_details(json!({
                "fileEvent": "created",
                "path": rel,
                "bytesWritten": content.len(),
            }))),
            Err(e) => Ok(workspace_error_result(&e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockAgent, make_ctx, workspace};
    use assert_matches::assert_matches;
    use conclave_core::roles::AgentRole;

    #[tokio::test]
    async fn creates_new_file() {
        let (_dir, ws) = workspace();
        let tool = CreateFileTool::new(Arc::clone(&ws));
        let agent = MockAgent::new(AgentRole::Backend, 1);
        let result = tool
            .execute(json!({"path": "server.txt", "content": "listen 80"}), &make_ctx(&agent))
            .await
            .unwrap();
        assert!(!result.is_error);
        let details = result.details.unwrap();
        assert_eq!(details["fileEvent"], "created");
        assert_eq!(details["path"], "server.txt");
        assert_eq!(ws.read("server.txt").unwrap(), "listen 80");
        assert!(ws.locks().is_empty());
    }

    #[tokio::test]
    async fn existing_file_guides_to_replace() {
        let (_dir, ws) = workspace();
        let _ = ws.create("devops", "Dockerfile", "FROM rust").unwrap();
        let tool = CreateFileTool::new(Arc::clone(&ws));
        let agent = MockAgent::new(AgentRole::Backend, 1);
        let result = tool
            .execute(json!({"path": "Dockerfile", "content": "FROM alpine"}), &make_ctx(&agent))
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("already exists"));
        assert!(result.content.contains("replaceInFile"));
        assert_eq!(ws.read("Dockerfile").unwrap(), "FROM rust");
    }

    #[tokio::test]
    async fn empty_content_allowed() {
        let (_dir, ws) = workspace();
        let tool = CreateFileTool::new(ws);
        let agent = MockAgent::new(AgentRole::Frontend, 1);
        let result = tool
            .execute(json!({"path": ".keep", "content": ""}), &make_ctx(&agent))
            .await
            .unwrap();
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn missing_path_is_validation_error() {
        let (_dir, ws) = workspace();
        let tool = CreateFileTool::new(Arc::clone(&ws));
        let agent = MockAgent::new(AgentRole::Frontend, 1);
        let err = tool
            .execute(json!({"content": "x"}), &make_ctx(&agent))
            .await
            .unwrap_err();
        assert_matches!(err, ToolError::Validation { ref message } if message.contains("Missing required parameter: path"));
        assert!(ws.list("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn traversal_is_denied() {
        let (_dir, ws) = workspace();
        let tool = CreateFileTool::new(ws);
        let agent = MockAgent::new(AgentRole::Frontend, 1);
        let result = tool
            .execute(json!({"path": "../../etc/x", "content": "x"}), &make_ctx(&agent))
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(result.details.unwrap()["error"], "access_denied");
    }
}
