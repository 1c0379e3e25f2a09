//! Unix socket transport integration tests

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use coshell_mcp::server::{McpHandler, McpServer, ToolCallError};
use coshell_mcp::transport::serve_unix;
use coshell_mcp::{BoxFuture, McpTool, ToolResult};

struct EchoHandler;

impl McpHandler for EchoHandler {
    fn list_tools(&self) -> BoxFuture<'_, Vec<McpTool>> {
        Box::pin(async move { Vec::new() })
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: Value,
    ) -> BoxFuture<'a, Result<Value, ToolCallError>> {
        Box::pin(async move {
            match name {
                "echo" => {
                    let message = arguments["message"].as_str().unwrap_or_default();
                    Ok(serde_json::to_value(ToolResult::text(message)).unwrap())
                }
                other => Err(ToolCallError::UnknownTool(other.to_string())),
            }
        })
    }
}

async fn connect(path: &std::path::Path) -> UnixStream {
    for _ in 0..100 {
        if path.exists() {
            if let Ok(stream) = UnixStream::connect(path).await {
                return stream;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("socket never came up at {}", path.display());
}

#[tokio::test]
async fn test_unix_socket_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("coshell.sock");

    let server = Arc::new(McpServer::new(Arc::new(EchoHandler)));
    let listener = tokio::spawn(serve_unix(server, socket_path.clone()));

    let stream = connect(&socket_path).await;
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    writer
        .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
        .await
        .unwrap();
    let response: Value =
        serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"], json!({}));

    // A notification produces no wire response; the next line on the
    // socket answers the following request instead.
    writer
        .write_all(b"{\"jsonrpc\":\"2.0\",\"method\":\"ping\"}\n")
        .await
        .unwrap();
    let call = json!({
        "jsonrpc": "2.0", "id": 2, "method": "tools/call",
        "params": { "name": "echo", "arguments": { "message": "over the socket" } }
    });
    writer
        .write_all(format!("{call}\n").as_bytes())
        .await
        .unwrap();

    let response: Value =
        serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(response["id"], 2);
    assert_eq!(response["result"]["content"][0]["text"], "over the socket");

    listener.abort();
}

#[tokio::test]
async fn test_unix_socket_concurrent_clients() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("coshell.sock");

    let server = Arc::new(McpServer::new(Arc::new(EchoHandler)));
    let listener = tokio::spawn(serve_unix(server, socket_path.clone()));

    let mut tasks = Vec::new();
    for i in 0..4u8 {
        let path = socket_path.clone();
        tasks.push(tokio::spawn(async move {
            let stream = connect(&path).await;
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();

            let call = json!({
                "jsonrpc": "2.0", "id": i, "method": "tools/call",
                "params": { "name": "echo", "arguments": { "message": format!("client {i}") } }
            });
            writer.write_all(format!("{call}\n").as_bytes()).await.unwrap();

            let response: Value =
                serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
            assert_eq!(response["id"], i);
            assert_eq!(
                response["result"]["content"][0]["text"],
                format!("client {i}")
            );
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    listener.abort();
}

#[tokio::test]
async fn test_stale_socket_file_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("coshell.sock");
    std::fs::write(&socket_path, "stale").unwrap();

    let server = Arc::new(McpServer::new(Arc::new(EchoHandler)));
    let listener = tokio::spawn(serve_unix(server, socket_path.clone()));

    let stream = connect(&socket_path).await;
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    writer
        .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
        .await
        .unwrap();
    assert!(lines.next_line().await.unwrap().is_some());

    listener.abort();
}
