//! Conversation history sanitation.
//!
//! Stored histories can accumulate tool-call records that never resolved:
//! calls interrupted mid-stream, or confirmation requests the user walked
//! away from in an earlier turn. The model must not be shown those dangling
//! calls again, so they are stripped before each turn.

use super::message::{ChatMessage, MessagePart, Role, ToolCallState};

/// Remove tool-call parts that carry no durable output.
///
/// Rules, applied to a fresh copy of the input:
/// - Parts in a non-terminal state other than `input-available` (client-side
///   streaming placeholders) are dropped from every message.
/// - `input-available` parts are kept only in the final message, where the
///   confirmation bridge resolves them; dangling ones in earlier assistant
///   messages are dropped.
/// - Assistant messages left without parts are dropped entirely.
///
/// Idempotent: sanitizing twice yields the same result as sanitizing once.
pub fn cleanup_messages(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let last_index = messages.len().saturating_sub(1);

    messages
        .iter()
        .enumerate()
        .filter_map(|(i, message)| {
            if message.role != Role::Assistant {
                return Some(message.clone());
            }

            let mut cleaned = message.clone();
            cleaned.parts.retain(|part| match part {
                MessagePart::ToolCall(call) => match call.state {
                    ToolCallState::OutputAvailable => true,
                    ToolCallState::InputAvailable => i == last_index,
                    ToolCallState::Other => false,
                },
                _ => true,
            });

            if cleaned.parts.is_empty() {
                None
            } else {
                Some(cleaned)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::ToolCallPart;
    use serde_json::json;

    fn assistant_with_call(state: ToolCallState) -> ChatMessage {
        let mut call = ToolCallPart::pending("get_weather_information", "c1", json!({}));
        call.state = state;
        if state == ToolCallState::OutputAvailable {
            call.output = Some(json!("sunny"));
        }
        ChatMessage::new(Role::Assistant, vec![MessagePart::ToolCall(call)])
    }

    #[test]
    fn test_keeps_plain_history() {
        let messages = vec![
            ChatMessage::user_text("hi"),
            ChatMessage::new(
                Role::Assistant,
                vec![MessagePart::Text {
                    text: "hello".to_string(),
                }],
            ),
        ];
        let cleaned = cleanup_messages(&messages);
        assert_eq!(cleaned.len(), 2);
    }

    #[test]
    fn test_drops_streaming_placeholder_parts() {
        let messages = vec![
            ChatMessage::user_text("hi"),
            assistant_with_call(ToolCallState::Other),
        ];
        let cleaned = cleanup_messages(&messages);
        // The assistant message became empty and was dropped with it.
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].role, Role::User);
    }

    #[test]
    fn test_drops_dangling_pending_calls_from_prior_turns() {
        let messages = vec![
            assistant_with_call(ToolCallState::InputAvailable),
            ChatMessage::user_text("actually, never mind"),
        ];
        let cleaned = cleanup_messages(&messages);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].role, Role::User);
    }

    #[test]
    fn test_keeps_pending_calls_in_latest_message() {
        let messages = vec![
            ChatMessage::user_text("what's the weather?"),
            assistant_with_call(ToolCallState::InputAvailable),
        ];
        let cleaned = cleanup_messages(&messages);
        assert_eq!(cleaned.len(), 2);
        assert!(cleaned[1].has_pending_tool_calls());
    }

    #[test]
    fn test_keeps_resolved_calls_everywhere() {
        let messages = vec![
            assistant_with_call(ToolCallState::OutputAvailable),
            ChatMessage::user_text("thanks"),
        ];
        let cleaned = cleanup_messages(&messages);
        assert_eq!(cleaned.len(), 2);
    }

    #[test]
    fn test_idempotent() {
        let messages = vec![
            assistant_with_call(ToolCallState::InputAvailable),
            assistant_with_call(ToolCallState::Other),
            ChatMessage::user_text("hi"),
            assistant_with_call(ToolCallState::InputAvailable),
        ];
        let once = cleanup_messages(&messages);
        let twice = cleanup_messages(&once);
        assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }

    #[test]
    fn test_does_not_mutate_input() {
        let messages = vec![assistant_with_call(ToolCallState::Other)];
        let _ = cleanup_messages(&messages);
        assert_eq!(messages[0].parts.len(), 1);
    }
}
