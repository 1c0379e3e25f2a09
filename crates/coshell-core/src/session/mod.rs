//! Persistent interactive shell sessions
//!
//! A session is one live shell process whose stdin/stdout the manager
//! owns. Successive commands share the process, so working directory,
//! shell variables, and background jobs persist between calls.

pub mod editor;
pub mod manager;
pub mod tools;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde_json::Value;
use tokio::process::{Child, ChildStdin};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

use crate::error::SessionError;

pub use manager::{ExecOutcome, SessionManager};

/// What to spawn for a new session, as produced by a [`SessionFactory`].
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
    /// Short key/value pairs shown by `session_list`; opaque to the manager.
    pub metadata: HashMap<String, String>,
}

/// Maps a caller's parameter bag onto a concrete child command.
///
/// The manager is oblivious to shell choice; embedders can swap in a
/// factory that launches a different shell or wraps it in a sandbox.
pub trait SessionFactory: Send + Sync {
    fn build(&self, params: &Value) -> Result<SessionSpec, SessionError>;
}

/// Default factory: a plain piped `bash`, optionally under another user
/// id via `su`, optionally with a starting working directory.
pub struct BashSessionFactory;

impl SessionFactory for BashSessionFactory {
    fn build(&self, params: &Value) -> Result<SessionSpec, SessionError> {
        let mut metadata = HashMap::new();

        let workdir = match params.get("workdir") {
            None | Some(Value::Null) => None,
            Some(Value::String(dir)) => Some(PathBuf::from(dir)),
            Some(_) => {
                return Err(SessionError::InvalidParams(
                    "`workdir` must be a string".to_string(),
                ))
            }
        };
        if let Some(dir) = &workdir {
            metadata.insert("workdir".to_string(), dir.display().to_string());
        }

        let user = match params.get("user") {
            None | Some(Value::Null) => None,
            Some(Value::String(user)) => Some(user.clone()),
            Some(_) => {
                return Err(SessionError::InvalidParams(
                    "`user` must be a string".to_string(),
                ))
            }
        };
        let (program, args) = match user {
            Some(user) => {
                metadata.insert("user".to_string(), user.clone());
                (
                    "su".to_string(),
                    vec!["-s".to_string(), "/bin/bash".to_string(), user],
                )
            }
            None => ("bash".to_string(), Vec::new()),
        };

        Ok(SessionSpec {
            program,
            args,
            workdir,
            metadata,
        })
    }
}

/// The exclusively-owned state of a live session. Only the task holding
/// the session mutex may write stdin or take from the output channel.
#[derive(Debug)]
pub struct Session {
    pub(crate) child: Child,
    pub(crate) stdin: ChildStdin,
    /// Merged stdout/stderr of the shell, one line per element, without
    /// the trailing newline. Closed when the reader task sees EOF.
    pub(crate) output: mpsc::Receiver<String>,
    /// Stderr lines captured during startup; used only to build
    /// diagnostic startup-failure messages.
    pub(crate) stderr_lines: Arc<StdMutex<Vec<String>>>,
}

/// A registered session: shared identity and metadata around the
/// mutex-guarded [`Session`]. The mutex is the per-session exec lock;
/// it lives and dies with its map entry.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: String,
    pub metadata: HashMap<String, String>,
    pub(crate) started: Instant,
    pub(crate) inner: Mutex<Session>,
}

impl SessionHandle {
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

/// A point-in-time description of one session, as shown by `session_list`.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: String,
    pub uptime: Duration,
    pub metadata: HashMap<String, String>,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  uptime: {}s", self.id, self.uptime.as_secs())?;
        let mut keys: Vec<_> = self.metadata.keys().collect();
        keys.sort();
        for key in keys {
            write!(f, "  {key}={}", self.metadata[key])?;
        }
        Ok(())
    }
}

/// Escape a string for safe interpolation into a shell command.
///
/// Wraps in single quotes, escaping internal single quotes as `'\''`.
pub fn shell_quote(s: &str) -> String {
    if s.contains('\'') {
        format!("'{}'", s.replace('\'', "'\\''"))
    } else {
        format!("'{s}'")
    }
}
