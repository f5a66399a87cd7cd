//! Streaming events emitted while a chat turn is processed.

use crate::error::{CopilotError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// An incremental event streamed to the client during a turn.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// A fragment of assistant text.
    TextDelta { delta: String },
    /// The model requested a tool call whose input is now complete.
    ToolInputAvailable {
        call_id: String,
        tool_name: String,
        input: Value,
    },
    /// A tool call resolved to a result.
    ToolOutputAvailable { call_id: String, output: Value },
    /// The turn completed.
    Finish,
    /// The turn failed; the stream ends after this event.
    Error { message: String },
}

/// Append-only sink for stream events.
///
/// Decouples turn processing from the transport: the HTTP layer forwards
/// events as SSE, tests collect them in memory.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emit one event. An error means the receiver is gone and the
    /// producer should stop generating.
    async fn emit(&self, event: StreamEvent) -> Result<()>;
}

/// Event sink backed by a bounded channel.
pub struct ChannelSink {
    tx: tokio::sync::mpsc::Sender<StreamEvent>,
}

impl ChannelSink {
    pub fn new(tx: tokio::sync::mpsc::Sender<StreamEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: StreamEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| CopilotError::Agent("event stream closed".to_string()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink that records every emitted event, for assertions in tests.
    #[derive(Default)]
    pub struct CollectingSink {
        pub events: Mutex<Vec<StreamEvent>>,
    }

    #[async_trait]
    impl EventSink for CollectingSink {
        async fn emit(&self, event: StreamEvent) -> Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }
}
