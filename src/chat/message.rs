//! Conversation message model.
//!
//! Messages mirror the wire format exchanged with chat clients: an ordered
//! list of parts (text and tool-call records) plus metadata carrying the
//! creation timestamp and any human approval decisions for pending tools.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Lifecycle state of a tool-call record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCallState {
    /// The model produced complete input; the call is ready to execute
    /// or awaiting human confirmation.
    InputAvailable,
    /// The call resolved to a result (success, error, or denial).
    OutputAvailable,
    /// Any other client-side state (e.g. input still streaming). These
    /// carry no durable output and are dropped by the sanitizer.
    #[default]
    #[serde(other, rename = "input-streaming")]
    Other,
}

/// A tool invocation embedded in a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallPart {
    /// Name of the tool the model asked for.
    pub tool_name: String,
    /// Call identifier assigned by the model.
    pub call_id: String,
    /// JSON input payload.
    pub input: Value,
    /// Current lifecycle state.
    pub state: ToolCallState,
    /// Result value, present once the state is `output-available`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl ToolCallPart {
    /// Create a pending call awaiting execution or confirmation.
    pub fn pending(tool_name: &str, call_id: &str, input: Value) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            call_id: call_id.to_string(),
            input,
            state: ToolCallState::InputAvailable,
            output: None,
        }
    }

    /// Transition this call to `output-available` with the given result.
    pub fn resolve(&mut self, output: Value) {
        self.state = ToolCallState::OutputAvailable;
        self.output = Some(output);
    }
}

/// One ordered part of a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text { text: String },
    ToolCall(ToolCallPart),
}

/// Human decision for a pending tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Denied,
    Pending,
}

/// Optional message metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageMetadata {
    /// Creation timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Approval decisions keyed by call id (true = approved).
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub approvals: HashMap<String, bool>,
}

/// A single conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique identifier within the conversation.
    pub id: String,
    pub role: Role,
    pub parts: Vec<MessagePart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl ChatMessage {
    /// Create a message with a generated id and current timestamp.
    pub fn new(role: Role, parts: Vec<MessagePart>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            parts,
            metadata: Some(MessageMetadata {
                created_at: Some(Utc::now()),
                approvals: HashMap::new(),
            }),
        }
    }

    /// Create a plain-text user message.
    pub fn user_text(text: &str) -> Self {
        Self::new(
            Role::User,
            vec![MessagePart::Text {
                text: text.to_string(),
            }],
        )
    }

    /// Concatenated text content of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Iterate over the tool-call parts of this message.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallPart> {
        self.parts.iter().filter_map(|p| match p {
            MessagePart::ToolCall(call) => Some(call),
            _ => None,
        })
    }

    /// Whether any tool-call part is still awaiting input resolution.
    pub fn has_pending_tool_calls(&self) -> bool {
        self.tool_calls()
            .any(|c| c.state == ToolCallState::InputAvailable)
    }

    /// Look up the human decision for a call id in this message's metadata.
    pub fn decision_for(&self, call_id: &str) -> Decision {
        match self
            .metadata
            .as_ref()
            .and_then(|m| m.approvals.get(call_id))
        {
            Some(true) => Decision::Approved,
            Some(false) => Decision::Denied,
            None => Decision::Pending,
        }
    }
}
