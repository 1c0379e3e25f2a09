//! MCP Server implementation
//!
//! Routes decoded JSON-RPC requests to a handler and shapes the
//! responses. Protocol errors (`-32xxx`) are produced only here; tool
//! failures travel inside a successful result as `isError:true`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::protocol::{methods, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::{BoxFuture, McpTool, ServerCapabilities, ToolsCapability, PROTOCOL_VERSION};

/// Failure modes of a tool invocation that surface as protocol errors.
#[derive(Debug)]
pub enum ToolCallError {
    /// No tool is registered under the requested name.
    UnknownTool(String),
    /// The handler itself failed (serialization, poisoned state, ...).
    Internal(String),
}

/// Handler for MCP requests
pub trait McpHandler: Send + Sync {
    /// List available tools
    fn list_tools(&self) -> BoxFuture<'_, Vec<McpTool>>;

    /// Call a tool. The returned value is the tool's result envelope
    /// and is passed through to the client verbatim.
    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: Value,
    ) -> BoxFuture<'a, Result<Value, ToolCallError>>;
}

/// MCP Server
pub struct McpServer<H: McpHandler> {
    handler: Arc<H>,
    capabilities: ServerCapabilities,
    server_name: String,
    server_version: String,
    instructions: Option<String>,
    /// Vendor-API tool names mapped onto local tool names.
    aliases: HashMap<String, String>,
}

impl<H: McpHandler> McpServer<H> {
    pub fn new(handler: Arc<H>) -> Self {
        let mut aliases = HashMap::new();
        aliases.insert(
            "str_replace_based_edit_tool".to_string(),
            "str_replace_editor".to_string(),
        );

        Self {
            handler,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
            },
            server_name: "coshell".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
            aliases,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    /// Instructions surfaced at the top level of the `initialize` result.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.aliases.insert(from.into(), to.into());
        self
    }

    /// Handle one line from a transport.
    ///
    /// Returns `None` for notifications; transports must not answer
    /// them. Unparseable input yields a `-32700` response with a null id.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => {
                let response =
                    JsonRpcResponse::error(RequestId::Null, JsonRpcError::parse_error(err));
                return serde_json::to_string(&response).ok();
            }
        };

        let is_notification = request.is_notification();
        let response = self.handle_request(request).await;
        if is_notification {
            None
        } else {
            serde_json::to_string(&response).ok()
        }
    }

    /// Handle a JSON-RPC request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(method = %request.method, "dispatching request");
        let id = request.id.unwrap_or(RequestId::Null);

        match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(id),
            methods::TOOLS_LIST => self.handle_tools_list(id).await,
            methods::TOOLS_CALL => self.handle_tools_call(id, request.params).await,
            methods::PING => JsonRpcResponse::success(id, json!({})),
            _ => JsonRpcResponse::error(id, JsonRpcError::method_not_found()),
        }
    }

    fn handle_initialize(&self, id: RequestId) -> JsonRpcResponse {
        let mut result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": self.capabilities,
            "serverInfo": {
                "name": self.server_name,
                "version": self.server_version
            }
        });

        if let Some(instructions) = &self.instructions {
            result["instructions"] = json!(instructions);
        }

        JsonRpcResponse::success(id, result)
    }

    async fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let tools = self.handler.list_tools().await;
        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params = params.unwrap_or_else(|| Value::Object(Default::default()));

        let name = match params.get("name").and_then(|v| v.as_str()) {
            Some(name) => name,
            None => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing tool name"),
                )
            }
        };

        let resolved = self
            .aliases
            .get(name)
            .map(String::as_str)
            .unwrap_or(name);

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or(Value::Object(Default::default()));

        match self.handler.call_tool(resolved, arguments).await {
            Ok(envelope) => JsonRpcResponse::success(id, envelope),
            Err(ToolCallError::UnknownTool(name)) => JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params(format!("Unknown tool: {name}")),
            ),
            Err(ToolCallError::Internal(detail)) => {
                JsonRpcResponse::error(id, JsonRpcError::internal_error(detail))
            }
        }
    }
}
