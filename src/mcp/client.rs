//! MCP client over stdio.
//!
//! Spawns a configured server process, performs the initialize handshake,
//! and exposes the server's tools as auto-executing registry entries.

use super::protocol::*;
use crate::config::McpServerSettings;
use crate::error::{CopilotError, Result};
use crate::tools::{ToolExecutor, ToolRegistry, ToolSpec};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Connection to a single MCP server process.
pub struct McpClient {
    name: String,
    conn: Mutex<Connection>,
}

struct Connection {
    // Held so the process is reaped when the client drops.
    _child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl McpClient {
    /// Spawn the server process and run the initialize handshake.
    pub async fn connect(settings: &McpServerSettings) -> Result<Self> {
        let mut child = Command::new(&settings.command)
            .args(&settings.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CopilotError::Mcp(format!("Failed to spawn {}: {}", settings.command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CopilotError::Mcp("Missing child stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CopilotError::Mcp("Missing child stdout".to_string()))?;

        let client = Self {
            name: settings.name.clone(),
            conn: Mutex::new(Connection {
                _child: child,
                stdin,
                stdout: BufReader::new(stdout),
                next_id: 1,
            }),
        };

        client
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": ClientInfo {
                        name: "edgecopilot".to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                })),
            )
            .await?;
        client.notify("initialized", None).await?;

        info!("Connected to MCP server '{}'", settings.name);
        Ok(client)
    }

    /// Send a request and wait for the matching response.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let mut conn = self.conn.lock().await;
        let id = conn.next_id;
        conn.next_id += 1;

        let request = JsonRpcRequest::new(id, method, params);
        let line = serde_json::to_string(&request)?;
        conn.stdin.write_all(line.as_bytes()).await?;
        conn.stdin.write_all(b"\n").await?;
        conn.stdin.flush().await?;

        // Skip any notifications or stale responses until our id shows up.
        loop {
            let mut buf = String::new();
            let read = conn.stdout.read_line(&mut buf).await?;
            if read == 0 {
                return Err(CopilotError::Mcp(format!(
                    "Server '{}' closed the connection",
                    self.name
                )));
            }
            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response: JsonRpcResponse = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(e) => {
                    debug!("Skipping non-response line from '{}': {}", self.name, e);
                    continue;
                }
            };
            if response.id != Some(id) {
                continue;
            }

            if let Some(error) = response.error {
                return Err(CopilotError::Mcp(format!(
                    "{} failed: {} ({})",
                    method, error.message, error.code
                )));
            }
            return response
                .result
                .ok_or_else(|| CopilotError::Mcp(format!("{}: empty result", method)));
        }
    }

    /// Send a notification (no response expected).
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let request = JsonRpcRequest::notification(method, params);
        let line = serde_json::to_string(&request)?;
        conn.stdin.write_all(line.as_bytes()).await?;
        conn.stdin.write_all(b"\n").await?;
        conn.stdin.flush().await?;
        Ok(())
    }

    /// List the tools the server exposes.
    pub async fn list_tools(&self) -> Result<Vec<RemoteTool>> {
        let result = self.request("tools/list", None).await?;
        let parsed: ToolsListResult = serde_json::from_value(result)?;
        Ok(parsed.tools)
    }

    /// Invoke a remote tool.
    pub async fn call_tool(&self, tool: &str, input: Value) -> Result<Value> {
        let result = self
            .request(
                "tools/call",
                Some(json!({ "name": tool, "arguments": input })),
            )
            .await?;
        let parsed: ToolCallResult = serde_json::from_value(result)?;

        if parsed.is_error == Some(true) {
            return Err(CopilotError::Tool(parsed.text()));
        }
        Ok(json!(parsed.text()))
    }
}

/// Executor that forwards a tool invocation to an MCP server.
struct McpToolExecutor {
    client: Arc<McpClient>,
    tool: String,
}

#[async_trait]
impl ToolExecutor for McpToolExecutor {
    async fn execute(&self, input: Value) -> Result<Value> {
        self.client.call_tool(&self.tool, input).await
    }
}

/// Connect to all configured servers and collect their tools into a
/// registry. A server that fails to connect or list tools is skipped with
/// a warning; discovery is best-effort.
pub async fn discover_tools(servers: &[McpServerSettings]) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    for settings in servers {
        let client = match McpClient::connect(settings).await {
            Ok(c) => Arc::new(c),
            Err(e) => {
                warn!("Skipping MCP server '{}': {}", settings.name, e);
                continue;
            }
        };

        let tools = match client.list_tools().await {
            Ok(t) => t,
            Err(e) => {
                warn!("Failed to list tools on '{}': {}", settings.name, e);
                continue;
            }
        };

        info!(
            "Discovered {} tool(s) from MCP server '{}'",
            tools.len(),
            settings.name
        );

        for tool in tools {
            let executor = Arc::new(McpToolExecutor {
                client: Arc::clone(&client),
                tool: tool.name.clone(),
            });
            registry.register(ToolSpec::auto(
                &tool.name,
                tool.description.as_deref().unwrap_or(""),
                tool.input_schema,
                executor,
            ));
        }
    }

    registry
}
