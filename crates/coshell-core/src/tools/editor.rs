//! Host filesystem editor - surgical string replacement
//!
//! Shares its command vocabulary (`view`, `str_replace`, `create`) and
//! response wording with the sessioned editor, but operates directly on
//! the host filesystem under a configured base directory.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use coshell_mcp::{BoxFuture, ToolResult};

use crate::tools::edit_utils::{
    already_exists_message, ambiguous_message, created_message, directory_header, edited_message,
    find_occurrences, not_found_message, number_lines, occurrence_lines, parse_view_range,
    path_not_found_message, replace_all, replace_at, unrecognized_command_message, view_header,
    view_range_header,
};
use crate::tools::Tool;

/// Tool for viewing, creating, and editing files on the host filesystem
pub struct StrReplaceEditor {
    base_dir: PathBuf,
}

impl StrReplaceEditor {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// All paths resolve under the base directory; a leading `/` is
    /// treated as the base directory root.
    fn resolve(&self, path: &str) -> PathBuf {
        self.base_dir.join(path.trim_start_matches('/'))
    }

    async fn run(&self, params: &Value) -> Result<String, String> {
        let command = params
            .get("command")
            .and_then(Value::as_str)
            .ok_or("Parameter `command` is required")?;
        let path = params
            .get("path")
            .and_then(Value::as_str)
            .ok_or("Parameter `path` is required")?;

        match command {
            "view" => self.view(path, params.get("view_range")).await,
            "str_replace" => self.str_replace(path, params).await,
            "create" => self.create(path, params).await,
            other => Err(unrecognized_command_message(other)),
        }
    }

    async fn view(&self, path: &str, view_range: Option<&Value>) -> Result<String, String> {
        let resolved = self.resolve(path);

        if !resolved.exists() {
            return Err(path_not_found_message(path));
        }

        if resolved.is_dir() {
            if view_range.is_some() {
                return Err(
                    "The `view_range` parameter is not allowed when `path` points to a \
                     directory."
                        .to_string(),
                );
            }
            return self.list_directory(&resolved, path).await;
        }

        let bytes = tokio::fs::read(&resolved)
            .await
            .map_err(|err| format!("Failed to read {path}: {err}"))?;
        let text = String::from_utf8_lossy(&bytes);
        let total_lines = text.lines().count();

        match view_range {
            None => Ok(format!("{}\n{}", view_header(path), number_lines(&text, 1))),
            Some(raw) => {
                let range = parse_view_range(raw, total_lines)?;
                let window = text
                    .lines()
                    .skip(range.start - 1)
                    .take(range.end - range.start + 1)
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(format!(
                    "{}\n{}",
                    view_range_header(path, range, total_lines),
                    number_lines(&window, range.start)
                ))
            }
        }
    }

    async fn list_directory(&self, resolved: &Path, display: &str) -> Result<String, String> {
        let display = display.trim_end_matches('/');
        let mut entries = Vec::new();

        let mut top = tokio::fs::read_dir(resolved)
            .await
            .map_err(|err| format!("Failed to list {display}: {err}"))?;
        while let Ok(Some(entry)) = top.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let rel = format!("{display}/{name}");
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push(rel.clone());

            if is_dir {
                if let Ok(mut nested) = tokio::fs::read_dir(entry.path()).await {
                    while let Ok(Some(child)) = nested.next_entry().await {
                        let child_name = child.file_name().to_string_lossy().into_owned();
                        if child_name.starts_with('.') {
                            continue;
                        }
                        entries.push(format!("{rel}/{child_name}"));
                    }
                }
            }
        }

        entries.sort();
        Ok(format!("{}\n{}", directory_header(display), entries.join("\n")))
    }

    async fn str_replace(&self, path: &str, params: &Value) -> Result<String, String> {
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

        let resolved = self.resolve(path);
        if !resolved.is_file() {
            return Err(path_not_found_message(path));
        }

        let content = tokio::fs::read(&resolved)
            .await
            .map_err(|err| format!("Failed to read {path}: {err}"))?;

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

        tokio::fs::write(&resolved, new_content)
            .await
            .map_err(|err| format!("Failed to write {path}: {err}"))?;

        Ok(edited_message(path, replacements))
    }

    async fn create(&self, path: &str, params: &Value) -> Result<String, String> {
        let file_text = params
            .get("file_text")
            .and_then(Value::as_str)
            .ok_or("Parameter `file_text` is required for command: create")?;

        let resolved = self.resolve(path);
        if resolved.exists() {
            return Err(already_exists_message(path));
        }

        if let Some(parent) = resolved.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|err| format!("Failed to create parent directory: {err}"))?;
            }
        }

        tokio::fs::write(&resolved, file_text)
            .await
            .map_err(|err| format!("Failed to write {path}: {err}"))?;

        Ok(created_message(path))
    }
}

impl Tool for StrReplaceEditor {
    fn name(&self) -> &str {
        "str_replace_editor"
    }

    fn description(&self) -> &str {
        "View, create, and edit files with exact string replacement. Paths resolve \
         against the server's base directory."
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
                "path": {
                    "type": "string",
                    "description": "Path to the file or directory"
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
            "required": ["command", "path"]
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
