//! Tool registry: the name → implementation index used for dispatch and schema.

use std::collections::BTreeMap;
use std::sync::Arc;

use conclave_core::tools::ToolDefinition;
use conclave_workspace::GuardedWorkspace;
use tracing::debug;

use crate::communication::{ReadMessageTool, TalkTool};
use crate::fs::{CreateFileTool, DeleteFileTool, ListFilesTool, ReadFileTool, ReplaceInFileTool};
use crate::traits::ConclaveTool;

/// Registry mapping tool names to their implementations.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ConclaveTool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The full tool set over one shared workspace.
    pub fn standard(workspace: Arc<GuardedWorkspace>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TalkTool));
        registry.register(Arc::new(ReadMessageTool));
        registry.register(Arc::new(CreateFileTool::new(Arc::clone(&workspace))));
        registry.register(Arc::new(ReadFileTool::new(Arc::clone(&workspace))));
        registry.register(Arc::new(ReplaceInFileTool::new(Arc::clone(&workspace))));
        registry.register(Arc::new(ListFilesTool::new(Arc::clone(&workspace))));
        registry.register(Arc::new(DeleteFileTool::new(workspace)));
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn ConclaveTool>) {
        debug!(tool_name = tool.name(), "tool registered");
        let _ = self.tools.insert(tool.name().to_owned(), tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ConclaveTool>> {
        self.tools.get(name).cloned()
    }

    /// Tool schemas, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::workspace;

    #[test]
    fn standard_registry_has_fixed_tool_set() {
        let (_dir, ws) = workspace();
        let registry = ToolRegistry::standard(ws);
        assert_eq!(
            registry.names(),
            vec![
                "createFile",
                "deleteFile",
                "listFiles",
                "readFile",
                "readMessage",
                "replaceInFile",
                "talk",
            ]
        );
        assert_eq!(registry.definitions().len(), 7);
        assert!(registry.get("talk").is_some());
        assert!(registry.get("bash").is_none());
    }

    #[test]
    fn definitions_match_names() {
        let (_dir, ws) = workspace();
        let registry = ToolRegistry::standard(ws);
        for def in registry.definitions() {
            assert_eq!(registry.get(&def.name).unwrap().name(), def.name);
            assert_eq!(def.parameters.schema_type, "object");
        }
    }

    #[test]
    fn empty_registry() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }
}
