//! Tool-confirmation bridge.
//!
//! Converts pending, human-approved tool invocations in the latest
//! assistant turn into concrete tool results before the history is
//! re-submitted to the model. Denials and executor failures become
//! error-valued results; a call is only left pending when no decision
//! has been recorded for it yet.

use super::message::{ChatMessage, Decision, MessagePart, Role, ToolCallState};
use super::stream::{EventSink, StreamEvent};
use crate::tools::ToolRegistry;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Result marker for a denied tool call.
pub const DENIAL_RESULT: &str = "Error: User denied access to tool execution";

/// Source of human approval decisions for pending tool calls.
///
/// Decisions normally travel in the latest message's metadata, but the
/// lookup is abstracted so the bridge can be tested without the transport.
pub trait ApprovalStore: Sync {
    fn decision(&self, call_id: &str) -> Decision;
}

/// Approval store reading decisions from a message's metadata.
pub struct MetadataApprovals<'a> {
    message: &'a ChatMessage,
}

impl<'a> MetadataApprovals<'a> {
    pub fn new(message: &'a ChatMessage) -> Self {
        Self { message }
    }
}

impl ApprovalStore for MetadataApprovals<'_> {
    fn decision(&self, call_id: &str) -> Decision {
        self.message.decision_for(call_id)
    }
}

/// Resolve human-decided tool calls in the last message of `messages`.
///
/// Returns a new sequence; only the last message may differ from the
/// input. Calls are left untouched when they are not `input-available`,
/// when no confirmation executor is registered for the tool (it is
/// auto-executing or unknown and the model layer handles it), or when the
/// decision is still pending. One [`StreamEvent::ToolOutputAvailable`] is
/// emitted per resolved call.
pub async fn process_tool_calls(
    messages: &[ChatMessage],
    registry: &ToolRegistry,
    approvals: &dyn ApprovalStore,
    sink: &dyn EventSink,
) -> Vec<ChatMessage> {
    let mut result: Vec<ChatMessage> = messages.to_vec();

    match result.last() {
        Some(last) if last.role == Role::Assistant => {}
        _ => return result,
    }
    let last_index = result.len() - 1;
    let last = &mut result[last_index];

    for part in &mut last.parts {
        let MessagePart::ToolCall(call) = part else {
            continue;
        };
        if call.state != ToolCallState::InputAvailable {
            continue;
        }
        let Some(executor) = registry.confirmation(&call.tool_name) else {
            continue;
        };

        let output = match approvals.decision(&call.call_id) {
            Decision::Pending => {
                debug!("No decision yet for call {}, leaving pending", call.call_id);
                continue;
            }
            Decision::Denied => {
                debug!("Call {} denied by user", call.call_id);
                json!(DENIAL_RESULT)
            }
            Decision::Approved => match executor.execute(call.input.clone()).await {
                Ok(value) => value,
                // One failing executor must not abort the bridge; the
                // failure becomes this call's result.
                Err(e) => {
                    warn!("Confirmation executor for {} failed: {}", call.tool_name, e);
                    error_result(&e.to_string())
                }
            },
        };

        call.resolve(output.clone());
        if sink
            .emit(StreamEvent::ToolOutputAvailable {
                call_id: call.call_id.clone(),
                output,
            })
            .await
            .is_err()
        {
            debug!("Event sink closed during tool confirmation");
        }
    }

    result
}

fn error_result(message: &str) -> Value {
    json!(format!("Error: {}", message))
}
