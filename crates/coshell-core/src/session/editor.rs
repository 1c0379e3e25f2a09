//! In-session file editor
//!
//! The same `view` / `str_replace` / `create` vocabulary as the host
//! editor, but every operation runs inside a session's shell, so edits
//! are atomic with respect to that session's view of the filesystem
//! (including changed working directories and user ids). File content
//! crosses the shell boundary base64-encoded in both directions.

use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};

use coshell_mcp::{BoxFuture, ToolResult};

use crate::error::SessionError;
use crate::session::manager::ExecOutcome;
use crate::session::{shell_quote, SessionManager};
use crate::tools::edit_utils::{
    already_exists_message, ambiguous_message, created_message, directory_header, edited_message,
    find_occurrences, not_found_message, occurrence_lines, parse_view_range, path_not_found_message,
    replace_all, replace_at, unrecognized_command_message, view_header, view_range_header,
};
use crate::tools::Tool;

/// Tool for viewing, creating, and editing files inside a session
pub struct SessionEditor {
    manager: Arc<SessionManager>,
}

impl SessionEditor {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    /// Run a shell command in the session, surfacing session-level
    /// failures as editor errors.
    async fn shell(&self, session_id: &str, command: String) -> Result<ExecOutcome, String> {
        if !self.manager.has_session(session_id).await {
            return Err(SessionError::NotFound(session_id.to_string()).to_string());
        }

        let outcome = self.manager.exec_command(session_id, &command, None).await;
        if outcome.timed_out {
            return Err(format!("Editor command timed out in session {session_id}"));
        }
        if outcome.process_died {
            return Err(format!("Session process has exited: {session_id}"));
        }
        Ok(outcome)
    }

    async fn run(&self, params: &Value) -> Result<String, String> {
        let command = params
            .get("command")
            .and_then(Value::as_str)
            .ok_or("Parameter `command` is required")?;
        let session_id = params
            .get("session_id")
            .and_then(Value::as_str)
            .ok_or("Parameter `session_id` is required")?;
        let path = params
            .get("path")
            .and_then(Value::as_str)
            .ok_or("Parameter `path` is required")?;

        match command {
            "view" => self.view(session_id, path, params.get("view_range")).await,
            "str_replace" => self.str_replace(session_id, path, params).await,
            "create" => self.create(session_id, path, params).await,
            other => Err(unrecognized_command_message(other)),
        }
    }

    async fn view(
        &self,
        session_id: &str,
        path: &str,
        view_range: Option<&Value>,
    ) -> Result<String, String> {
        let quoted = shell_quote(path);
        let probe = self
            .shell(
                session_id,
                format!("test -d {quoted} && echo DIR || (test -f {quoted} && echo FILE || echo NOTFOUND)"),
            )
            .await?;

        // Residual output from an earlier command may precede the probe
        // answer; only the final line is the answer.
        match probe.output.lines().last().map(str::trim) {
            Some("DIR") => {
                if view_range.is_some() {
                    return Err(
                        "The `view_range` parameter is not allowed when `path` points to a \
                         directory."
                            .to_string(),
                    );
                }
                let listing = self
                    .shell(
                        session_id,
                        format!("find {quoted} -maxdepth 2 -not -path '*/.*'"),
                    )
                    .await?;
                Ok(format!("{}\n{}", directory_header(path), listing.output))
            }
            Some("FILE") => self.view_file(session_id, path, &quoted, view_range).await,
            _ => Err(path_not_found_message(path)),
        }
    }

    async fn view_file(
        &self,
        session_id: &str,
        path: &str,
        quoted: &str,
        view_range: Option<&Value>,
    ) -> Result<String, String> {
        let Some(raw) = view_range else {
            let numbered = self
                .shell(
                    session_id,
                    format!("awk '{{printf \"%d\\t%s\\n\", NR, $0}}' {quoted}"),
                )
                .await?;
            if numbered.exit_code != Some(0) {
                return Err(format!("Failed to read {path}: {}", numbered.output));
            }
            return Ok(format!("{}\n{}", view_header(path), numbered.output));
        };

        let counted = self.shell(session_id, format!("wc -l < {quoted}")).await?;
        if counted.exit_code != Some(0) {
            return Err(format!("Failed to read {path}: {}", counted.output));
        }
        let total_lines: usize = counted
            .output
            .lines()
            .last()
            .and_then(|line| line.trim().parse().ok())
            .ok_or_else(|| format!("Failed to count lines of {path}"))?;

        let range = parse_view_range(raw, total_lines)?;
        let numbered = self
            .shell(
                session_id,
                format!(
                    "awk 'NR>={} && NR<={} {{printf \"%d\\t%s\\n\", NR, $0}}' {quoted}",
                    range.start, range.end
                ),
            )
            .await?;
        if numbered.exit_code != Some(0) {
            return Err(format!("Failed to read {path}: {}", numbered.output));
        }

        Ok(format!(
            "{}\n{}",
            view_range_header(path, range, total_lines),
            numbered.output
        ))
    }

    /// Fetch a file's bytes through the session shell.
    async fn read_file(&self, session_id: &str, path: &str, quoted: &str) -> Result<Vec<u8>, String> {
        let outcome = self.shell(session_id, format!("base64 {quoted}")).await?;
        if outcome.exit_code != Some(0) {
            return Err(format!("Failed to read {path}: {}", outcome.output));
        }
        // `base64` wraps its output; strip all whitespace before decoding.
        let encoded: String = outcome
            .output
            .split_whitespace()
            .collect();
        STANDARD
            .decode(encoded)
            .map_err(|err| format!("Failed to decode content of {path}: {err}"))
    }

    /// Write bytes back through the session shell with a base64-framed
    /// here-document. The random delimiter keeps arbitrary content from
    /// terminating the document early.
    async fn write_file(
        &self,
        session_id: &str,
        path: &str,
        quoted: &str,
        content: &[u8],
    ) -> Result<(), String> {
        let encoded = STANDARD.encode(content);
        let delimiter = format!("COSHELL_EOF_{:08x}{:08x}", rand::random::<u32>(), rand::random::<u32>());
        let outcome = self
            .shell(
                session_id,
                format!("base64 -d > {quoted} << '{delimiter}'\n{encoded}\n{delimiter}"),
            )
            .await?;
        if outcome.exit_code != Some(0) {
            return Err(format!("Failed to write {path}: {}", outcome.output));
        }
        Ok(())
    }

    async fn str_replace(
        &self,
        session_id: &str,
        path: &str,
        params: &Value,
    ) -> Result<String, String> {
        let old_str = params
            .get("old_str")
            .and_then(Value::as_str)
            .ok_or("Parameter `old_str` is required for command: str_replace")?;
        let new_str = params
            .get("new_str")
            .and_then(Value::as_str)
            .ok_or("Parameter `new_str` is required for command: str_replace")?;
        let replace_everywhere = params
            .get("replace_all")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if old_str == new_str {
            return Err("Parameters `old_str` and `new_str` must be different".to_string());
        }

        let quoted = shell_quote(path);
        let content = self.read_file(session_id, path, &quoted).await?;

        let needle = old_str.as_bytes();
        let offsets = find_occurrences(&content, needle);

        if offsets.is_empty() {
            return Err(not_found_message(old_str, path));
        }
        if offsets.len() > 1 && !replace_everywhere {
            let lines = occurrence_lines(&content, &offsets);
            return Err(ambiguous_message(old_str, path, &lines));
        }

        let replacements = if replace_everywhere { offsets.len() } else { 1 };
        let new_content = if replace_everywhere {
            replace_all(&content, needle, new_str.as_bytes())
        } else {
            replace_at(&content, offsets[0], needle.len(), new_str.as_bytes())
        };

        self.write_file(session_id, path, &quoted, &new_content)
            .await?;

        Ok(edited_message(path, replacements))
    }

    async fn create(&self, session_id: &str, path: &str, params: &Value) -> Result<String, String> {
        let file_text = params
            .get("file_text")
            .and_then(Value::as_str)
            .ok_or("Parameter `file_text` is required for command: create")?;

        let quoted = shell_quote(path);
        let probe = self
            .shell(
                session_id,
                format!("test -e {quoted} && echo EXISTS || echo ABSENT"),
            )
            .await?;
        if probe.output.lines().last().map(str::trim) == Some("EXISTS") {
            return Err(already_exists_message(path));
        }

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                let parent_quoted = shell_quote(&parent.to_string_lossy());
                let made = self
                    .shell(session_id, format!("mkdir -p {parent_quoted}"))
                    .await?;
                if made.exit_code != Some(0) {
                    return Err(format!(
                        "Failed to create parent directory: {}",
                        made.output
                    ));
                }
            }
        }

        self.write_file(session_id, path, &quoted, file_text.as_bytes())
            .await?;

        Ok(created_message(path))
    }
}

impl Tool for SessionEditor {
    fn name(&self) -> &str {
        "session_editor"
    }

    fn description(&self) -> &str {
        "View, create, and edit files inside a persistent shell session. Paths are \
         interpreted by the session's shell; prefer absolute paths."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "enum": ["view", "create", "str_replace"],
                    "description": "The operation to run"
                },
                "session_id": {
                    "type": "string",
                    "description": "Id returned by the session start tool"
                },
                "path": {
                    "type": "string",
                    "description": "Absolute path to the file or directory inside the session"
                },
                "file_text": {
                    "type": "string",
                    "description": "Content for the `create` command"
                },
                "old_str": {
                    "type": "string",
                    "description": "Exact text to replace (must be unique unless replace_all)"
                },
                "new_str": {
                    "type": "string",
                    "description": "Replacement text"
                },
                "view_range": {
                    "type": "array",
                    "items": { "type": "integer" },
                    "description": "1-based inclusive [start, end] line range; -1 for end means end of file"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace every occurrence of old_str",
                    "default": false
                }
            },
            "required": ["command", "session_id", "path"]
        })
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, ToolResult> {
        Box::pin(async move {
            match self.run(&params).await {
                Ok(text) => ToolResult::text(text),
                Err(message) => ToolResult::error(message),
            }
        })
    }
}
