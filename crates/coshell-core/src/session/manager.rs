//! Session lifecycle and sentinel-framed command execution
//!
//! Interactive shells offer no built-in request/response boundary, so
//! every exec appends a per-call random marker that the shell echoes
//! back together with the exit status. The marker is recognised at line
//! granularity; a leading newline in the wrapper guarantees it starts
//! its own line even when the command's output ends mid-line.

use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SessionTuning;
use crate::error::SessionError;
use crate::session::{Session, SessionFactory, SessionHandle, SessionSummary};

/// Capacity of the per-session output line channel.
const OUTPUT_CHANNEL_CAPACITY: usize = 10_000;
/// Grace period for banner output before the first readiness poll.
const BANNER_DELAY: Duration = Duration::from_millis(500);
/// How long one readiness poll waits for its marker to echo back.
const READY_POLL_WINDOW: Duration = Duration::from_secs(10);
/// Per-take wait while scanning for a readiness marker.
const READY_TAKE_WAIT: Duration = Duration::from_secs(2);
/// Pause between a graceful `exit` and the kill signal.
const STOP_GRACE: Duration = Duration::from_millis(300);
/// Longest single wait on the output channel during an exec.
const EXEC_TAKE_WAIT: Duration = Duration::from_secs(1);

/// Result of one `exec_command` call.
///
/// `exit_code` is `None` when the command produced no exit status: the
/// call timed out, or the process died before the sentinel arrived.
#[derive(Debug)]
pub struct ExecOutcome {
    pub output: String,
    pub exit_code: Option<i32>,
    pub process_died: bool,
    pub timed_out: bool,
}

impl ExecOutcome {
    fn stopped() -> Self {
        Self {
            output: "Error: session has been stopped".to_string(),
            exit_code: Some(1),
            process_died: false,
            timed_out: false,
        }
    }

    fn exited() -> Self {
        Self {
            output: "Error: process has exited".to_string(),
            exit_code: Some(1),
            process_died: true,
            timed_out: false,
        }
    }
}

/// Manages the set of live sessions.
///
/// Exec calls on one session are serialised by that session's mutex;
/// sessions are independent of each other.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    factory: Arc<dyn SessionFactory>,
    tuning: SessionTuning,
}

impl SessionManager {
    pub fn new(factory: Arc<dyn SessionFactory>, tuning: SessionTuning) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            factory,
            tuning,
        }
    }

    pub fn tuning(&self) -> &SessionTuning {
        &self.tuning
    }

    pub async fn has_session(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Spawn a shell and wait until it is responsive.
    ///
    /// Fails with [`SessionError::Startup`] if the child exits during
    /// the handshake or never echoes a readiness marker; the failure
    /// message carries the child's stderr and any residual stdout.
    pub async fn start_session(&self, params: &Value) -> Result<Arc<SessionHandle>, SessionError> {
        let spec = self.factory.build(params)?;
        let id = Uuid::new_v4().to_string();

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.workdir {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;
        let stdin = child.stdin.take().ok_or_else(|| SessionError::Startup {
            message: "child stdin unavailable".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| SessionError::Startup {
            message: "child stdout unavailable".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| SessionError::Startup {
            message: "child stderr unavailable".to_string(),
        })?;

        // Sole consumer of the child's stdout. Dropping the sender on
        // EOF (or stream error) is the channel's close signal.
        let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let reader_id = id.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        debug!(session_id = %reader_id, "stdout reader error: {err}");
                        break;
                    }
                }
            }
            debug!(session_id = %reader_id, "stdout reader finished");
        });

        // Stderr is only interesting until startup completes; the
        // post-ready `exec 2>&1` folds it into stdout and this reader
        // sees EOF.
        let stderr_lines = Arc::new(StdMutex::new(Vec::new()));
        let stderr_buffer = Arc::clone(&stderr_lines);
        let stderr_id = id.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(session_id = %stderr_id, "stderr: {line}");
                if let Ok(mut buffer) = stderr_buffer.lock() {
                    buffer.push(line);
                }
            }
        });

        let mut session = Session {
            child,
            stdin,
            output: rx,
            stderr_lines,
        };

        if let Err(err) = self.ready_handshake(&mut session).await {
            let _ = session.child.start_kill();
            return Err(err);
        }

        let handle = Arc::new(SessionHandle {
            id: id.clone(),
            metadata: spec.metadata,
            started: Instant::now(),
            inner: tokio::sync::Mutex::new(session),
        });
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::clone(&handle));

        info!(session_id = %id, "session started");
        Ok(handle)
    }

    /// Poll the shell with `echo <marker>` until the marker comes back,
    /// then redirect stderr into stdout and drain leftover echoes.
    async fn ready_handshake(&self, session: &mut Session) -> Result<(), SessionError> {
        sleep(BANNER_DELAY).await;

        let deadline = Instant::now() + Duration::from_secs(self.tuning.ready_timeout_secs);
        while Instant::now() < deadline {
            if let Some(status) = session.child.try_wait()? {
                // Give the stderr reader a moment to drain the pipe.
                sleep(BANNER_DELAY).await;
                return Err(SessionError::Startup {
                    message: startup_failure_message(session, Some(status)),
                });
            }

            let marker = new_marker();
            session
                .stdin
                .write_all(format!("echo {marker}\n").as_bytes())
                .await?;
            session.stdin.flush().await?;

            let window = Instant::now() + READY_POLL_WINDOW;
            let mut ready = false;
            while Instant::now() < window {
                match timeout(READY_TAKE_WAIT, session.output.recv()).await {
                    Ok(Some(line)) => {
                        if line.contains(&marker) {
                            ready = true;
                            break;
                        }
                        debug!("discarding startup output: {line}");
                    }
                    Ok(None) => break,
                    Err(_) => {}
                }
            }

            if ready {
                // Let echoes of earlier poll markers arrive, then drop them.
                sleep(Duration::from_millis(300)).await;
                drain_channel(&mut session.output);
                session.stdin.write_all(b"exec 2>&1\n").await?;
                session.stdin.flush().await?;
                sleep(Duration::from_millis(100)).await;
                drain_channel(&mut session.output);
                return Ok(());
            }
        }

        Err(SessionError::Startup {
            message: startup_failure_message(session, None),
        })
    }

    /// Run one command in a session and wait for its sentinel.
    ///
    /// The command is deliberately not wrapped in a subshell so `cd`,
    /// variable assignments, and background jobs persist. A timeout
    /// leaves the process alive and the session healthy; the next call
    /// drains whatever output (including a late sentinel) is pending.
    pub async fn exec_command(
        &self,
        session_id: &str,
        command: &str,
        timeout_ms: Option<u64>,
    ) -> ExecOutcome {
        let timeout_ms = timeout_ms
            .unwrap_or(self.tuning.default_timeout_ms)
            .min(self.tuning.max_timeout_ms);

        let handle = { self.sessions.read().await.get(session_id).cloned() };
        let Some(handle) = handle else {
            return ExecOutcome::stopped();
        };

        let mut session = handle.inner.lock().await;
        // The session may have been stopped while we waited for its lock.
        if !self.sessions.read().await.contains_key(session_id) {
            return ExecOutcome::stopped();
        }

        let already_exited = matches!(session.child.try_wait(), Ok(Some(_)));
        if already_exited && session.output.is_closed() && session.output.is_empty() {
            return ExecOutcome::exited();
        }

        let marker = new_marker();
        // Exit status is captured into a named variable before anything
        // else runs; `$?` alone is fragile. The leading newline puts the
        // marker at the start of its own line.
        let wrapped =
            format!("{command}\n__MCP_EC__=$?; printf '\\n{marker}%d\\n' \"$__MCP_EC__\"\n");
        debug!(session_id, marker = %marker, "executing command");

        if session.stdin.write_all(wrapped.as_bytes()).await.is_err()
            || session.stdin.flush().await.is_err()
        {
            return ExecOutcome::exited();
        }

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut buffer = String::new();
        let mut exit_code: Option<i32> = None;
        let mut process_died = false;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let take = remaining.min(EXEC_TAKE_WAIT);

            let taken = timeout(take, session.output.recv()).await;
            match taken {
                Ok(Some(line)) => {
                    if let Some((head, code)) = split_marker_line(&line, &marker) {
                        buffer.push_str(head);
                        exit_code = Some(code);
                        break;
                    }
                    buffer.push_str(&line);
                    buffer.push('\n');
                }
                Ok(None) => {
                    if reap_if_dead(
                        &mut session,
                        &marker,
                        &mut buffer,
                        &mut exit_code,
                        &mut process_died,
                    ) {
                        break;
                    }
                    // Channel closed but the process lives on; wait out
                    // the deadline without spinning.
                    sleep(take).await;
                }
                Err(_) => {
                    if reap_if_dead(
                        &mut session,
                        &marker,
                        &mut buffer,
                        &mut exit_code,
                        &mut process_died,
                    ) {
                        break;
                    }
                }
            }
        }

        let timed_out = exit_code.is_none() && !process_died;
        if timed_out {
            warn!(session_id, timeout_ms, "command timed out");
        }

        if buffer.ends_with('\n') {
            buffer.pop();
        }
        let output = truncate_chars(buffer, self.tuning.max_output_chars);

        ExecOutcome {
            output,
            exit_code,
            process_died,
            timed_out,
        }
    }

    /// Stop one session: graceful `exit`, short grace period, then kill.
    /// Returns false when no such session exists.
    pub async fn stop_session(&self, session_id: &str) -> bool {
        let handle = { self.sessions.write().await.remove(session_id) };
        let Some(handle) = handle else {
            return false;
        };

        let mut session = handle.inner.lock().await;
        if session.stdin.write_all(b"exit\n").await.is_ok() {
            let _ = session.stdin.flush().await;
        }
        sleep(STOP_GRACE).await;

        if !matches!(session.child.try_wait(), Ok(Some(_))) {
            if let Err(err) = session.child.kill().await {
                warn!(session_id, "failed to kill session process: {err}");
            }
        }

        let _ = session.stdin.shutdown().await;
        session.output.close();

        info!(session_id, "session stopped");
        true
    }

    /// Stop every session, in snapshot order.
    pub async fn stop_all_sessions(&self) {
        let ids: Vec<String> = { self.sessions.read().await.keys().cloned().collect() };
        for id in ids {
            self.stop_session(&id).await;
        }
    }

    /// Describe all sessions without touching their exec locks.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions
            .values()
            .map(|handle| SessionSummary {
                id: handle.id.clone(),
                uptime: handle.uptime(),
                metadata: handle.metadata.clone(),
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }
}

/// Fresh random marker for one exec or readiness poll.
fn new_marker() -> String {
    format!("MCP_MARK_{}", Uuid::new_v4().simple())
}

/// If `line` carries the sentinel, split it into the output tail before
/// the marker and the parsed exit status after it.
fn split_marker_line<'a>(line: &'a str, marker: &str) -> Option<(&'a str, i32)> {
    let pos = line.find(marker)?;
    let code = line[pos + marker.len()..].trim().parse().ok()?;
    Some((&line[..pos], code))
}

/// When the process has died, greedily drain the (possibly closed)
/// channel hunting for a late sentinel. Returns true when the exec loop
/// should stop.
fn reap_if_dead(
    session: &mut Session,
    marker: &str,
    buffer: &mut String,
    exit_code: &mut Option<i32>,
    process_died: &mut bool,
) -> bool {
    if !matches!(session.child.try_wait(), Ok(Some(_))) {
        return false;
    }

    while let Ok(line) = session.output.try_recv() {
        if let Some((head, code)) = split_marker_line(&line, marker) {
            buffer.push_str(head);
            *exit_code = Some(code);
            break;
        }
        buffer.push_str(&line);
        buffer.push('\n');
    }

    if exit_code.is_none() {
        *process_died = true;
    }
    true
}

/// Discard everything currently buffered on the channel.
fn drain_channel(rx: &mut mpsc::Receiver<String>) {
    while rx.try_recv().is_ok() {}
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text;
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}\n... (output truncated at {max_chars} characters)")
}

fn startup_failure_message(session: &mut Session, status: Option<ExitStatus>) -> String {
    let mut message = match status {
        Some(status) => format!("shell exited during startup ({status})"),
        None => "shell did not become ready in time".to_string(),
    };

    let stderr = session
        .stderr_lines
        .lock()
        .map(|buffer| buffer.join("\n"))
        .unwrap_or_default();
    if !stderr.is_empty() {
        message.push_str("\nstderr:\n");
        message.push_str(&stderr);
    }

    let mut stdout_tail = Vec::new();
    while let Ok(line) = session.output.try_recv() {
        stdout_tail.push(line);
    }
    if !stdout_tail.is_empty() {
        message.push_str("\nstdout:\n");
        message.push_str(&stdout_tail.join("\n"));
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_marker_line() {
        let marker = "MCP_MARK_abc";
        assert_eq!(split_marker_line("MCP_MARK_abc0", marker), Some(("", 0)));
        assert_eq!(
            split_marker_line("tailMCP_MARK_abc42", marker),
            Some(("tail", 42))
        );
        assert_eq!(split_marker_line("no marker here", marker), None);
        // Marker present but no parseable status: not a sentinel line.
        assert_eq!(split_marker_line("MCP_MARK_abc", marker), None);
        assert_eq!(split_marker_line("MCP_MARK_abc oops", marker), None);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short".to_string(), 10), "short");
        let long = "x".repeat(12);
        let truncated = truncate_chars(long, 10);
        assert!(truncated.starts_with(&"x".repeat(10)));
        assert!(truncated.contains("output truncated at 10 characters"));
    }

    #[test]
    fn test_markers_are_unique() {
        assert_ne!(new_marker(), new_marker());
    }
}
