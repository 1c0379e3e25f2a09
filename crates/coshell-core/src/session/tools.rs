//! Session tool surface: start, exec, stop, list
//!
//! Thin wrappers that translate between tool parameters and the
//! [`SessionManager`]. Tool names carry a configurable prefix so an
//! embedder can expose several session families side by side.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use coshell_mcp::{BoxFuture, ToolResult};

use crate::session::SessionManager;
use crate::tools::Tool;

/// Starts a new session.
///
/// The input schema can be extended by the embedder with extra
/// properties and extra required fields (for example to demand a
/// `user` or `workdir`).
pub struct SessionStartTool {
    manager: Arc<SessionManager>,
    name: String,
    extra_properties: Map<String, Value>,
    extra_required: Vec<String>,
}

impl SessionStartTool {
    pub fn new(manager: Arc<SessionManager>, prefix: &str) -> Self {
        Self {
            manager,
            name: format!("{prefix}_start"),
            extra_properties: Map::new(),
            extra_required: Vec::new(),
        }
    }

    pub fn with_schema_extras(
        mut self,
        properties: Map<String, Value>,
        required: Vec<String>,
    ) -> Self {
        self.extra_properties = properties;
        self.extra_required = required;
        self
    }
}

impl Tool for SessionStartTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Start a persistent interactive shell session. Returns the session id to \
         use with the exec, stop, and editor tools."
    }

    fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        properties.insert(
            "workdir".to_string(),
            json!({
                "type": "string",
                "description": "Working directory for the new shell"
            }),
        );
        properties.insert(
            "user".to_string(),
            json!({
                "type": "string",
                "description": "User id to launch the shell under"
            }),
        );
        for (key, value) in &self.extra_properties {
            properties.insert(key.clone(), value.clone());
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": self.extra_required
        })
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, ToolResult> {
        Box::pin(async move {
            match self.manager.start_session(&params).await {
                Ok(handle) => ToolResult::text(format!("Session '{}' started.", handle.id)),
                Err(err) => ToolResult::error(format!("Failed to start session: {err}")),
            }
        })
    }
}

/// Runs one command in an existing session.
pub struct SessionExecTool {
    manager: Arc<SessionManager>,
    name: String,
}

impl SessionExecTool {
    pub fn new(manager: Arc<SessionManager>, prefix: &str) -> Self {
        Self {
            manager,
            name: format!("{prefix}_exec"),
        }
    }
}

impl Tool for SessionExecTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Run a command in a persistent shell session. Working directory, shell \
         variables, and background jobs persist across calls."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "session_id": {
                    "type": "string",
                    "description": "Id returned by the start tool"
                },
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in milliseconds (max 600000, default 120000)"
                },
                "description": {
                    "type": "string",
                    "description": "Clear, concise description of what this command does"
                }
            },
            "required": ["session_id", "command"]
        })
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, ToolResult> {
        Box::pin(async move {
            let session_id = match params.get("session_id").and_then(Value::as_str) {
                Some(id) => id,
                None => return ToolResult::error("Parameter `session_id` is required"),
            };
            let command = match params.get("command").and_then(Value::as_str) {
                Some(command) => command,
                None => return ToolResult::error("Parameter `command` is required"),
            };

            let tuning = self.manager.tuning();
            let timeout_ms = params
                .get("timeout")
                .and_then(Value::as_u64)
                .unwrap_or(tuning.default_timeout_ms)
                .min(tuning.max_timeout_ms);

            let outcome = self
                .manager
                .exec_command(session_id, command, Some(timeout_ms))
                .await;

            let status = if outcome.timed_out {
                Some(format!("[Command timed out after {timeout_ms}ms]"))
            } else if outcome.process_died {
                Some("[Process exited]".to_string())
            } else {
                match outcome.exit_code {
                    Some(0) => None,
                    Some(code) => Some(format!("[Exit code: {code}]")),
                    None => None,
                }
            };

            let mut text = outcome.output;
            if let Some(status) = status {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&status);
                ToolResult::error(text)
            } else {
                ToolResult::text(text)
            }
        })
    }
}

/// Stops a session.
pub struct SessionStopTool {
    manager: Arc<SessionManager>,
    name: String,
}

impl SessionStopTool {
    pub fn new(manager: Arc<SessionManager>, prefix: &str) -> Self {
        Self {
            manager,
            name: format!("{prefix}_stop"),
        }
    }
}

impl Tool for SessionStopTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Stop a persistent shell session and release its process."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "session_id": {
                    "type": "string",
                    "description": "Id returned by the start tool"
                }
            },
            "required": ["session_id"]
        })
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, ToolResult> {
        Box::pin(async move {
            let session_id = match params.get("session_id").and_then(Value::as_str) {
                Some(id) => id,
                None => return ToolResult::error("Parameter `session_id` is required"),
            };

            if self.manager.stop_session(session_id).await {
                ToolResult::text(format!("Session '{session_id}' stopped."))
            } else {
                ToolResult::error(format!("Session not found: {session_id}"))
            }
        })
    }
}

/// Lists active sessions.
pub struct SessionListTool {
    manager: Arc<SessionManager>,
    name: String,
}

impl SessionListTool {
    pub fn new(manager: Arc<SessionManager>, prefix: &str) -> Self {
        Self {
            manager,
            name: format!("{prefix}_list"),
        }
    }
}

impl Tool for SessionListTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "List active shell sessions with uptime and metadata."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    fn execute(&self, _params: Value) -> BoxFuture<'_, ToolResult> {
        Box::pin(async move {
            let summaries = self.manager.list_sessions().await;
            if summaries.is_empty() {
                return ToolResult::text("No active sessions.");
            }
            let lines = summaries
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n");
            ToolResult::text(lines)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionTuning;
    use crate::session::BashSessionFactory;

    fn manager() -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            Arc::new(BashSessionFactory),
            SessionTuning::default(),
        ))
    }

    #[test]
    fn test_tool_names_carry_prefix() {
        let manager = manager();
        assert_eq!(SessionStartTool::new(manager.clone(), "shell").name(), "shell_start");
        assert_eq!(SessionExecTool::new(manager.clone(), "shell").name(), "shell_exec");
        assert_eq!(SessionStopTool::new(manager.clone(), "shell").name(), "shell_stop");
        assert_eq!(SessionListTool::new(manager, "shell").name(), "shell_list");
    }

    #[test]
    fn test_start_schema_extension() {
        let mut extra = Map::new();
        extra.insert(
            "user".to_string(),
            json!({"type": "string", "description": "Run the shell as this user"}),
        );
        let tool = SessionStartTool::new(manager(), "session")
            .with_schema_extras(extra, vec!["user".to_string()]);

        let schema = tool.input_schema();
        assert_eq!(
            schema["properties"]["user"]["description"],
            "Run the shell as this user"
        );
        assert_eq!(schema["required"][0], "user");
    }

    #[test]
    fn test_exec_schema_shape() {
        let tool = SessionExecTool::new(manager(), "session");
        let schema = tool.input_schema();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["session_id"].is_object());
        assert!(schema["properties"]["timeout"].is_object());
        assert_eq!(schema["required"][0], "session_id");
        assert_eq!(schema["required"][1], "command");
    }
}
