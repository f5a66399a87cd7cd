//! Chat turn orchestration with a streaming tool-calling loop.

use crate::chat::{
    cleanup_messages, process_tool_calls, ChatMessage, EventSink, MessagePart, MetadataApprovals,
    Role, StreamEvent, ToolCallPart, ToolCallState,
};
use crate::config::{ModelSettings, Prompts, Settings};
use crate::error::{CopilotError, Result};
use crate::openai::create_client;
use crate::store::MessageStore;
use crate::tools::{builtin_registry, ToolRegistry};
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCallChunk,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FunctionCall,
};
use futures::StreamExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Chat agent handling one conversation turn at a time.
///
/// Each turn: sanitize stored history, resolve human-confirmed tool calls,
/// then stream model output while executing auto tools, bounded by the
/// configured step ceiling.
pub struct ChatAgent {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    settings: ModelSettings,
    system_prompt: String,
    static_tools: ToolRegistry,
    discovered_tools: ToolRegistry,
    store: Arc<dyn MessageStore>,
}

impl ChatAgent {
    /// Create an agent from settings, with the builtin tool set.
    pub fn new(settings: &Settings, store: Arc<dyn MessageStore>) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        Ok(Self {
            client: create_client(),
            settings: settings.model.clone(),
            system_prompt: prompts.system_prompt(),
            static_tools: builtin_registry(),
            discovered_tools: ToolRegistry::new(),
            store,
        })
    }

    /// Attach tools discovered from connected MCP servers.
    pub fn with_discovered_tools(mut self, tools: ToolRegistry) -> Self {
        self.discovered_tools = tools;
        self
    }

    /// Union of static and discovered tools; static entries win on
    /// name collision. Built fresh for every turn.
    fn effective_tools(&self) -> ToolRegistry {
        let mut tools = self.static_tools.clone();
        tools.merge(self.discovered_tools.clone());
        tools
    }

    /// Append a synthetic user message for a scheduled task trigger.
    pub async fn execute_task(&self, conversation: &str, description: &str) -> Result<()> {
        info!("Scheduled task on '{}': {}", conversation, description);
        crate::store::inject_scheduled_task(self.store.as_ref(), conversation, description).await
    }

    /// Process one conversation turn, streaming events to `sink`.
    ///
    /// A sink that reports closure (client disconnected) aborts further
    /// generation; already-persisted messages are kept.
    pub async fn handle_turn(&self, conversation: &str, sink: &dyn EventSink) -> Result<()> {
        let tools = self.effective_tools();
        debug!("Turn on '{}' with {} tool(s)", conversation, tools.len());

        let stored = self.store.load(conversation).await?;
        let cleaned = cleanup_messages(&stored);

        // Resolve any human-decided tool calls before the model sees the
        // history again.
        let processed = match cleaned.last() {
            Some(last) if last.role == Role::Assistant => {
                let approvals = MetadataApprovals::new(last);
                process_tool_calls(&cleaned, &tools, &approvals, sink).await
            }
            _ => cleaned,
        };
        self.store.replace(conversation, processed.clone()).await?;

        // Calls still awaiting a decision end the turn; they are carried
        // forward unresolved, never dropped.
        if processed
            .last()
            .is_some_and(ChatMessage::has_pending_tool_calls)
        {
            debug!("Turn on '{}' paused awaiting confirmation", conversation);
            sink.emit(StreamEvent::Finish).await?;
            return Ok(());
        }

        let mut model_messages = convert_to_model_messages(&self.system_prompt, &processed)?;
        let definitions = tools.definitions();

        for step in 1..=self.settings.max_steps {
            debug!("Model step {} of {}", step, self.settings.max_steps);

            let mut builder = CreateChatCompletionRequestArgs::default();
            builder
                .model(&self.settings.model)
                .messages(model_messages.clone())
                .temperature(self.settings.temperature);
            if !definitions.is_empty() {
                builder.tools(definitions.clone());
            }
            let request = builder
                .build()
                .map_err(|e| CopilotError::Agent(e.to_string()))?;

            let mut stream = self
                .client
                .chat()
                .create_stream(request)
                .await
                .map_err(|e| CopilotError::OpenAI(format!("Stream setup failed: {}", e)))?;

            let mut text = String::new();
            let mut buffer = ToolCallBuffer::default();

            while let Some(chunk) = stream.next().await {
                let chunk =
                    chunk.map_err(|e| CopilotError::OpenAI(format!("Stream failed: {}", e)))?;
                let Some(choice) = chunk.choices.first() else {
                    continue;
                };

                if let Some(content) = &choice.delta.content {
                    if !content.is_empty() {
                        text.push_str(content);
                        sink.emit(StreamEvent::TextDelta {
                            delta: content.clone(),
                        })
                        .await?;
                    }
                }
                if let Some(chunks) = &choice.delta.tool_calls {
                    for tc in chunks {
                        buffer.apply(tc);
                    }
                }
            }

            let calls = buffer.finish();
            if calls.is_empty() {
                // Plain text response ends the turn.
                self.store
                    .append(conversation, assistant_message(&text, vec![]))
                    .await?;
                sink.emit(StreamEvent::Finish).await?;
                return Ok(());
            }

            let mut parts = Vec::new();
            let mut awaiting_confirmation = false;
            for (call_id, tool_name, input) in calls {
                let mut part = ToolCallPart::pending(&tool_name, &call_id, input.clone());

                match tools.executor(&tool_name) {
                    Some(executor) => {
                        let output = match executor.execute(input.clone()).await {
                            Ok(value) => value,
                            Err(e) => {
                                warn!("Tool {} failed: {}", tool_name, e);
                                Value::String(format!("Error: {}", e))
                            }
                        };
                        part.resolve(output.clone());
                        sink.emit(StreamEvent::ToolOutputAvailable {
                            call_id: call_id.clone(),
                            output,
                        })
                        .await?;
                    }
                    None => {
                        // Confirmation-required or unknown: persisted
                        // pending, resolved by the bridge next turn.
                        awaiting_confirmation = true;
                        sink.emit(StreamEvent::ToolInputAvailable {
                            call_id: call_id.clone(),
                            tool_name: tool_name.clone(),
                            input,
                        })
                        .await?;
                    }
                }
                parts.push(MessagePart::ToolCall(part));
            }

            let message = assistant_message(&text, parts);
            self.store.append(conversation, message.clone()).await?;

            if awaiting_confirmation {
                sink.emit(StreamEvent::Finish).await?;
                return Ok(());
            }

            append_turn_messages(&mut model_messages, &message)?;
        }

        warn!(
            "Turn on '{}' hit the step ceiling ({})",
            conversation, self.settings.max_steps
        );
        sink.emit(StreamEvent::Finish).await?;
        Ok(())
    }
}

/// Build an assistant message from streamed text and tool-call parts.
fn assistant_message(text: &str, mut parts: Vec<MessagePart>) -> ChatMessage {
    let mut all_parts = Vec::new();
    if !text.is_empty() {
        all_parts.push(MessagePart::Text {
            text: text.to_string(),
        });
    }
    all_parts.append(&mut parts);
    ChatMessage::new(Role::Assistant, all_parts)
}

/// Accumulator for streamed tool-call fragments, keyed by choice index.
#[derive(Default)]
struct ToolCallBuffer {
    calls: BTreeMap<u32, (String, String, String)>,
}

impl ToolCallBuffer {
    fn apply(&mut self, chunk: &ChatCompletionMessageToolCallChunk) {
        let entry = self.calls.entry(chunk.index).or_default();
        if let Some(id) = &chunk.id {
            entry.0 = id.clone();
        }
        if let Some(function) = &chunk.function {
            if let Some(name) = &function.name {
                entry.1.push_str(name);
            }
            if let Some(arguments) = &function.arguments {
                entry.2.push_str(arguments);
            }
        }
    }

    /// Completed calls in index order as (call id, tool name, input).
    fn finish(self) -> Vec<(String, String, Value)> {
        self.calls
            .into_values()
            .map(|(id, name, arguments)| {
                let input = if arguments.is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(&arguments).unwrap_or_else(|e| {
                        warn!("Invalid tool arguments for {}: {}", name, e);
                        Value::Object(Default::default())
                    })
                };
                (id, name, input)
            })
            .collect()
    }
}

/// Convert stored messages to the OpenAI chat format, system prompt first.
///
/// Resolved tool calls become an assistant tool-call entry plus a tool
/// result entry. A call still pending confirmation gets a placeholder
/// result so the model sees it as unresolved without breaking the
/// protocol's call/result pairing.
fn convert_to_model_messages(
    system_prompt: &str,
    messages: &[ChatMessage],
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let err = |e: async_openai::error::OpenAIError| CopilotError::Agent(e.to_string());

    let mut result: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt.to_string())
            .build()
            .map_err(err)?
            .into(),
    ];

    for message in messages {
        match message.role {
            Role::User | Role::System => {
                let text = message.text();
                if text.is_empty() {
                    continue;
                }
                result.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(text)
                        .build()
                        .map_err(err)?
                        .into(),
                );
            }
            Role::Assistant => {
                let text = message.text();
                let calls: Vec<&ToolCallPart> = message.tool_calls().collect();

                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                if !text.is_empty() {
                    builder.content(text);
                }
                if !calls.is_empty() {
                    let tool_calls: Vec<ChatCompletionMessageToolCall> = calls
                        .iter()
                        .map(|c| ChatCompletionMessageToolCall {
                            id: c.call_id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: c.tool_name.clone(),
                                arguments: c.input.to_string(),
                            },
                        })
                        .collect();
                    builder.tool_calls(tool_calls);
                }
                result.push(builder.build().map_err(err)?.into());

                for call in calls {
                    let content = match (&call.state, &call.output) {
                        (ToolCallState::OutputAvailable, Some(output)) => output_text(output),
                        _ => "Tool call pending user confirmation.".to_string(),
                    };
                    result.push(
                        ChatCompletionRequestToolMessageArgs::default()
                            .tool_call_id(call.call_id.clone())
                            .content(content)
                            .build()
                            .map_err(err)?
                            .into(),
                    );
                }
            }
        }
    }

    Ok(result)
}

/// Append one completed tool-loop step to the model message list.
fn append_turn_messages(
    model_messages: &mut Vec<ChatCompletionRequestMessage>,
    message: &ChatMessage,
) -> Result<()> {
    let mut converted = convert_to_model_messages("", std::slice::from_ref(message))?;
    // Drop the leading system prompt duplicate.
    model_messages.extend(converted.drain(1..));
    Ok(())
}

/// Render a tool result for the model.
fn output_text(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::CollectingSink;
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn chunk(
        index: u32,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) -> ChatCompletionMessageToolCallChunk {
        ChatCompletionMessageToolCallChunk {
            index,
            id: id.map(String::from),
            r#type: None,
            function: Some(async_openai::types::FunctionCallStream {
                name: name.map(String::from),
                arguments: arguments.map(String::from),
            }),
        }
    }

    #[test]
    fn test_buffer_accumulates_fragmented_arguments() {
        let mut buffer = ToolCallBuffer::default();
        buffer.apply(&chunk(0, Some("call_1"), Some("get_local_time"), None));
        buffer.apply(&chunk(0, None, None, Some("{\"location\":")));
        buffer.apply(&chunk(0, None, None, Some("\"Oslo\"}")));

        let calls = buffer.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "call_1");
        assert_eq!(calls[0].1, "get_local_time");
        assert_eq!(calls[0].2, json!({"location": "Oslo"}));
    }

    #[test]
    fn test_buffer_keeps_parallel_calls_separate() {
        let mut buffer = ToolCallBuffer::default();
        buffer.apply(&chunk(0, Some("c0"), Some("a"), Some("{}")));
        buffer.apply(&chunk(1, Some("c1"), Some("b"), Some("{}")));

        let calls = buffer.finish();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, "a");
        assert_eq!(calls[1].1, "b");
    }

    #[test]
    fn test_buffer_tolerates_malformed_arguments() {
        let mut buffer = ToolCallBuffer::default();
        buffer.apply(&chunk(0, Some("c0"), Some("a"), Some("{not json")));

        let calls = buffer.finish();
        assert_eq!(calls[0].2, json!({}));
    }

    #[test]
    fn test_convert_starts_with_system_prompt() {
        let messages = vec![ChatMessage::user_text("hi")];
        let converted = convert_to_model_messages("prompt", &messages).unwrap();
        assert_eq!(converted.len(), 2);
        assert!(matches!(
            converted[0],
            ChatCompletionRequestMessage::System(_)
        ));
        assert!(matches!(converted[1], ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn test_convert_pairs_resolved_calls_with_tool_results() {
        let mut call = ToolCallPart::pending("get_local_time", "c1", json!({}));
        call.resolve(json!({"time": "10:00"}));
        let messages = vec![
            ChatMessage::user_text("time?"),
            ChatMessage::new(Role::Assistant, vec![MessagePart::ToolCall(call)]),
        ];

        let converted = convert_to_model_messages("prompt", &messages).unwrap();
        // system, user, assistant tool call, tool result
        assert_eq!(converted.len(), 4);
        assert!(matches!(
            converted[2],
            ChatCompletionRequestMessage::Assistant(_)
        ));
        assert!(matches!(converted[3], ChatCompletionRequestMessage::Tool(_)));
    }

    #[test]
    fn test_convert_marks_unresolved_calls() {
        let call = ToolCallPart::pending("get_weather_information", "c1", json!({}));
        let messages = vec![ChatMessage::new(
            Role::Assistant,
            vec![MessagePart::ToolCall(call)],
        )];

        let converted = convert_to_model_messages("prompt", &messages).unwrap();
        assert_eq!(converted.len(), 3);
        match &converted[2] {
            ChatCompletionRequestMessage::Tool(tool) => match &tool.content {
                async_openai::types::ChatCompletionRequestToolMessageContent::Text(text) => {
                    assert!(text.contains("pending"));
                }
                _ => panic!("expected text content"),
            },
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_assistant_message_orders_text_before_calls() {
        let part = MessagePart::ToolCall(ToolCallPart::pending("t", "c", json!({})));
        let message = assistant_message("thinking", vec![part]);
        assert_eq!(message.parts.len(), 2);
        assert!(matches!(message.parts[0], MessagePart::Text { .. }));
    }

    #[test]
    fn test_output_text_unwraps_strings() {
        assert_eq!(output_text(&json!("plain")), "plain");
        assert_eq!(output_text(&json!({"temp": 72})), "{\"temp\":72}");
    }

    #[tokio::test]
    async fn test_turn_pauses_on_undecided_confirmation() {
        let store: Arc<dyn MessageStore> = Arc::new(InMemoryStore::new());
        let agent = ChatAgent::new(&Settings::default(), Arc::clone(&store)).unwrap();

        // An undecided confirmation-gated call at the tail of the history.
        store
            .append("main", ChatMessage::user_text("what's the weather?"))
            .await
            .unwrap();
        store
            .append(
                "main",
                ChatMessage::new(
                    Role::Assistant,
                    vec![MessagePart::ToolCall(ToolCallPart::pending(
                        "get_weather_information",
                        "c1",
                        json!({"city": "Oslo"}),
                    ))],
                ),
            )
            .await
            .unwrap();

        let sink = CollectingSink::default();
        agent.handle_turn("main", &sink).await.unwrap();

        // The turn ends without contacting the model: one finish event,
        // nothing else.
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Finish));

        // The call is carried forward unresolved.
        let messages = store.load("main").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages.last().unwrap().has_pending_tool_calls());
    }
}
