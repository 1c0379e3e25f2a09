//! Ad-hoc shell execution tool
//!
//! One command per `bash -c` process; nothing persists between calls.
//! A non-zero exit status is an ordinary result, not a tool error: the
//! status is reported in the text and `isError` stays false. Only a
//! timeout or a spawn failure flips the error flag.

use std::process::Stdio;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use coshell_mcp::{BoxFuture, ToolResult};

use crate::config::BashToolConfig;
use crate::tools::Tool;

const STDERR_SEPARATOR: &str = "\n--- stderr ---\n";
const EMPTY_OUTPUT: &str = "<system>Tool ran without output or errors</system>";

/// Tool for executing a single shell command
pub struct BashTool {
    config: BashToolConfig,
}

impl BashTool {
    pub fn new(config: BashToolConfig) -> Self {
        Self { config }
    }

    async fn run(&self, command: &str, timeout_secs: u64) -> ToolResult {
        debug!(command = %command, timeout_secs, "running bash command");

        let output = match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            Command::new("bash")
                .arg("-c")
                .arg(command)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return ToolResult::error(format!("Failed to run command: {err}"));
            }
            Err(_) => {
                return ToolResult::error(format!(
                    "Command timed out after {timeout_secs} seconds"
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);

        let mut text = stdout.into_owned();
        if !stderr.is_empty() {
            text.push_str(STDERR_SEPARATOR);
            text.push_str(&stderr);
        }

        if text.len() > self.config.max_output_bytes {
            let mut cut = self.config.max_output_bytes;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
            text.push_str(&format!(
                "\n... (output truncated at {} bytes)",
                self.config.max_output_bytes
            ));
        }

        if exit_code != 0 {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&format!("Exit code: {exit_code}"));
        } else if text.is_empty() {
            text.push_str(EMPTY_OUTPUT);
        }

        ToolResult::text(text)
    }
}

impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Run a shell command and return its output. Each command runs in a fresh \
         bash process; use the session tools for state that must persist."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (max 600, default 120)"
                },
                "description": {
                    "type": "string",
                    "description": "Clear, concise description of what this command does"
                }
            },
            "required": ["command"]
        })
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, ToolResult> {
        Box::pin(async move {
            let command = match params.get("command").and_then(Value::as_str) {
                Some(command) => command.to_string(),
                None => return ToolResult::error("Parameter `command` is required"),
            };

            let timeout_secs = params
                .get("timeout")
                .and_then(Value::as_u64)
                .unwrap_or(self.config.default_timeout_secs)
                .min(self.config.max_timeout_secs);

            self.run(&command, timeout_secs).await
        })
    }
}
