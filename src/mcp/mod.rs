//! MCP (Model Context Protocol) client for dynamic tool discovery.
//!
//! Connected servers contribute tools to the agent's tool set alongside
//! the builtins. JSON-RPC 2.0 over stdio.

mod client;
mod protocol;

pub use client::{discover_tools, McpClient};
pub use protocol::RemoteTool;
