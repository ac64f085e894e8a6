//! The tool contract the orchestrator dispatches against: a name, a
//! description and JSON-Schema parameter shape for the model, and an
//! async handler. Mirrors the reference SDK's `NodeTool`/`ToolRegistry`
//! split rather than a stringly-typed map of closures, so each tool
//! carries its own schema alongside its handler.

use async_trait::async_trait;
use cwa_domain::error::{Error, Result};
use cwa_domain::tool::ToolDefinition;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for this tool's arguments.
    fn parameters(&self) -> Value;
    /// Execute the tool, returning a JSON result (never a raw panic —
    /// failures should be surfaced as `Error::ToolExecution`).
    async fn execute(&self, args: Value) -> Result<Value>;
}

/// Dispatch table from tool name to handler, built once at startup and
/// shared (read-only) across the session.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// The tool definitions to advertise to the LLM provider, in
    /// alphabetical order by name for deterministic prompts.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut names = self.tool_names();
        names.sort();
        names
            .into_iter()
            .filter_map(|name| {
                let tool = self.tools.get(&name)?;
                Some(ToolDefinition {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameters(),
                })
            })
            .collect()
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::ToolExecution(format!("unknown tool: {name}")))?;
        tool.execute(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters(&self) -> Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, args: Value) -> Result<Value> {
            Ok(args)
        }
    }

    #[tokio::test]
    async fn registers_and_dispatches_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        assert_eq!(registry.tool_names(), vec!["echo".to_string()]);
        let result = registry.execute("echo", serde_json::json!({"a": 1})).await.unwrap();
        assert_eq!(result, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let registry = ToolRegistry::new();
        let err = registry.execute("nope", Value::Null).await.unwrap_err();
        assert!(matches!(err, Error::ToolExecution(_)));
    }

    #[test]
    fn definitions_are_sorted_and_carry_schema() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }
}
