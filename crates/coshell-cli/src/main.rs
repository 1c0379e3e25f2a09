//! Coshell CLI - MCP server for shell, editor, and session tools

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use coshell_core::config::Config;
use coshell_core::session::editor::SessionEditor;
use coshell_core::session::tools::{
    SessionExecTool, SessionListTool, SessionStartTool, SessionStopTool,
};
use coshell_core::session::{BashSessionFactory, SessionManager};
use coshell_core::tools::bash::BashTool;
use coshell_core::tools::editor::StrReplaceEditor;
use coshell_core::tools::ToolRegistry;
use coshell_mcp::server::McpServer;
use coshell_mcp::transport::{cleanup_socket, serve_stdio, serve_unix};

#[derive(Parser)]
#[command(name = "coshell")]
#[command(version)]
#[command(about = "MCP server exposing shell execution, file editing, and persistent shell sessions", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also listen on a Unix domain socket at this path
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Base directory for the host filesystem editor
    #[arg(short, long)]
    base_dir: Option<PathBuf>,

    /// Prefix for the session tool names
    #[arg(long)]
    session_prefix: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Stdout carries the wire protocol; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(if cli.verbose { "debug" } else { "info" })
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(socket) = cli.socket {
        config.socket = Some(socket);
    }
    if let Some(base_dir) = cli.base_dir {
        config.base_dir = base_dir;
    }
    if let Some(prefix) = cli.session_prefix {
        config.session_prefix = prefix;
    }

    let manager = Arc::new(SessionManager::new(
        Arc::new(BashSessionFactory),
        config.tuning.clone(),
    ));

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(BashTool::new(config.bash.clone())));
    registry.register(Arc::new(StrReplaceEditor::new(config.base_dir.clone())));
    registry.register(Arc::new(SessionStartTool::new(
        Arc::clone(&manager),
        &config.session_prefix,
    )));
    registry.register(Arc::new(SessionExecTool::new(
        Arc::clone(&manager),
        &config.session_prefix,
    )));
    registry.register(Arc::new(SessionStopTool::new(
        Arc::clone(&manager),
        &config.session_prefix,
    )));
    registry.register(Arc::new(SessionListTool::new(
        Arc::clone(&manager),
        &config.session_prefix,
    )));
    registry.register(Arc::new(SessionEditor::new(Arc::clone(&manager))));

    let mut server = McpServer::new(Arc::new(registry)).with_name("coshell");
    if let Some(instructions) = config.instructions.clone() {
        server = server.with_instructions(instructions);
    }
    let server = Arc::new(server);

    if let Some(path) = config.socket.clone() {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            if let Err(err) = serve_unix(server, path).await {
                error!("unix socket server error: {err}");
            }
        });
    }

    tokio::select! {
        result = serve_stdio(Arc::clone(&server)) => {
            result?;
            info!("stdin closed, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
        }
    }

    manager.stop_all_sessions().await;
    if let Some(path) = &config.socket {
        cleanup_socket(path);
    }

    Ok(())
}
