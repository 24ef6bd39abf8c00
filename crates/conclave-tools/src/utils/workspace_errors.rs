//! Turn workspace failures into guided tool results.

use conclave_core::tools::{ToolResult, error_result};
use conclave_workspace::WorkspaceError;
use serde_json::json;

/// An error result carrying the failure and its remediation hint.
pub fn workspace_error_result(err: &WorkspaceError) -> ToolResult {
    error_result(format!("Error: {err}. {}", err.guidance()))
        .with_details(json!({"error": err.kind()}))
}
