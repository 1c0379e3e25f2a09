//! Tool system for the coshell server
//!
//! Tools are the operations exposed through `tools/call`. Each tool has:
//! - A name and description advertised via `tools/list`
//! - A JSON schema for parameters
//! - An execute method returning the uniform result envelope
//!
//! Tools never raise across the dispatch boundary: failures are
//! converted into `isError:true` envelopes inside `execute`.

pub mod bash;
pub mod edit_utils;
pub mod editor;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use coshell_mcp::server::{McpHandler, ToolCallError};
use coshell_mcp::{BoxFuture, McpTool, ToolResult};

/// Core trait for all tools
pub trait Tool: Send + Sync {
    /// Tool name (used by clients to invoke)
    fn name(&self) -> &str;

    /// Description of what the tool does
    fn description(&self) -> &str;

    /// JSON schema for parameters (`{type, properties, required}`)
    fn input_schema(&self) -> Value;

    /// Execute the tool with given parameters
    fn execute(&self, params: Value) -> BoxFuture<'_, ToolResult>;

    /// Convert to the MCP tool definition advertised via `tools/list`
    fn to_mcp_tool(&self) -> McpTool {
        McpTool {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all tool definitions (map order, not significant)
    pub fn list(&self) -> Vec<McpTool> {
        self.tools.values().map(|t| t.to_mcp_tool()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl McpHandler for ToolRegistry {
    fn list_tools(&self) -> BoxFuture<'_, Vec<McpTool>> {
        Box::pin(async move { self.list() })
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: Value,
    ) -> BoxFuture<'a, Result<Value, ToolCallError>> {
        Box::pin(async move {
            let tool = self
                .get(name)
                .ok_or_else(|| ToolCallError::UnknownTool(name.to_string()))?;
            let result = tool.execute(arguments).await;
            serde_json::to_value(&result).map_err(|e| ToolCallError::Internal(e.to_string()))
        })
    }
}
