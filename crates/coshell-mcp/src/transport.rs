//! MCP Transport layer implementations
//!
//! Both transports frame one JSON object per line. Diagnostics go to
//! stderr via `tracing`; the stdio transport owns stdout exclusively.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::server::{McpHandler, McpServer};

/// Serve requests over standard input/output.
///
/// Each request carrying an id is dispatched on its own task so a
/// long-running tool call never blocks other requests. Responses are
/// written in completion order through a single stdout guard, which
/// keeps concurrent writes from interleaving.
pub async fn serve_stdio<H: McpHandler + 'static>(server: Arc<McpServer<H>>) -> io::Result<()> {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let stdout = Arc::new(Mutex::new(tokio::io::stdout()));

    info!("serving MCP over stdio");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let server = Arc::clone(&server);
        let stdout = Arc::clone(&stdout);
        tokio::spawn(async move {
            if let Some(response) = server.handle_line(&line).await {
                let mut out = stdout.lock().await;
                if let Err(err) = write_line(&mut *out, &response).await {
                    error!("failed to write response: {err}");
                }
            }
        });
    }

    debug!("stdin closed, stdio transport exiting");
    Ok(())
}

async fn write_line<W: AsyncWriteExt + Unpin>(out: &mut W, response: &str) -> io::Result<()> {
    out.write_all(response.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

/// Serve requests on a Unix domain socket.
///
/// A stale socket file is unlinked before binding. Each accepted client
/// runs its own sequential read/dispatch/write loop; clients are
/// independent of each other. The caller removes the socket file once
/// this future is dropped on shutdown.
pub async fn serve_unix<H: McpHandler + 'static>(
    server: Arc<McpServer<H>>,
    socket_path: PathBuf,
) -> io::Result<()> {
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let listener = UnixListener::bind(&socket_path)?;
    info!("serving MCP on unix socket {}", socket_path.display());

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    if let Err(err) = handle_client(server, stream).await {
                        debug!("client connection ended with error: {err}");
                    }
                });
            }
            Err(err) => {
                error!("failed to accept connection: {err}");
            }
        }
    }
}

async fn handle_client<H: McpHandler>(
    server: Arc<McpServer<H>>,
    stream: UnixStream,
) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(response) = server.handle_line(line).await {
            write_line(&mut writer, &response).await?;
        }
    }

    Ok(())
}

/// Remove a socket file left behind by `serve_unix`, ignoring a path
/// that is already gone.
pub fn cleanup_socket(socket_path: &Path) {
    if socket_path.exists() {
        if let Err(err) = std::fs::remove_file(socket_path) {
            error!("failed to remove socket file: {err}");
        }
    }
}
