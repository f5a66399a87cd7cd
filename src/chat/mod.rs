//! Conversation model, history sanitation, and the tool-confirmation bridge.

mod bridge;
mod message;
mod sanitize;
mod stream;

pub use bridge::{process_tool_calls, ApprovalStore, MetadataApprovals, DENIAL_RESULT};
pub use message::{
    ChatMessage, Decision, MessageMetadata, MessagePart, Role, ToolCallPart, ToolCallState,
};
pub use sanitize::cleanup_messages;
pub use stream::{ChannelSink, EventSink, StreamEvent};

#[cfg(test)]
pub(crate) use stream::testing;
