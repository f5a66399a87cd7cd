//! Edge Copilot - Streaming Chat Agent Server
//!
//! An HTTP chat-agent service that forwards conversation turns to a hosted
//! language model, interleaves tool invocations, and streams incremental
//! responses back to the client.
//!
//! # Overview
//!
//! Edge Copilot allows you to:
//! - Serve AI chat conversations over HTTP with SSE streaming
//! - Let the model call tools, automatically or behind a human
//!   confirmation step
//! - Discover additional tools from connected MCP servers
//! - Inject scheduled-task turns into a conversation
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt management
//! - `chat` - Message model, history sanitation, confirmation bridge
//! - `tools` - Tool registry (auto-executing and confirmation-gated)
//! - `mcp` - MCP client for dynamic tool discovery
//! - `store` - Conversation state storage
//! - `agent` - Chat turn orchestration and the streaming tool loop
//! - `cli` - Command-line interface and the HTTP server
//!
//! # Example
//!
//! ```rust,no_run
//! use edgecopilot::agent::ChatAgent;
//! use edgecopilot::chat::{ChannelSink, ChatMessage};
//! use edgecopilot::config::Settings;
//! use edgecopilot::store::{InMemoryStore, MessageStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let store: Arc<dyn MessageStore> = Arc::new(InMemoryStore::new());
//!     let agent = ChatAgent::new(&settings, Arc::clone(&store))?;
//!
//!     store.append("demo", ChatMessage::user_text("Why is my TTFB high?")).await?;
//!     let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//!     agent.handle_turn("demo", &ChannelSink::new(tx)).await?;
//!     while let Some(event) = rx.recv().await {
//!         println!("{:?}", serde_json::to_string(&event)?);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod mcp;
pub mod openai;
pub mod store;
pub mod tools;

pub use error::{CopilotError, Result};
