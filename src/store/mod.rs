//! Conversation state storage.
//!
//! In the deployed topology the hosted runtime owns durable conversation
//! state; this trait is the boundary to it. The in-memory implementation
//! serializes access per process and is sufficient for a single instance.

use crate::chat::ChatMessage;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Storage boundary for per-conversation message history.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Load the full history of a conversation (empty if unknown).
    async fn load(&self, conversation: &str) -> Result<Vec<ChatMessage>>;

    /// Replace the full history of a conversation.
    async fn replace(&self, conversation: &str, messages: Vec<ChatMessage>) -> Result<()>;

    /// Append one message to a conversation.
    async fn append(&self, conversation: &str, message: ChatMessage) -> Result<()>;

    /// Replace the last message of a conversation. Appends if empty.
    async fn update_last(&self, conversation: &str, message: ChatMessage) -> Result<()>;
}

/// In-memory message store keyed by conversation name.
#[derive(Default)]
pub struct InMemoryStore {
    conversations: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn load(&self, conversation: &str) -> Result<Vec<ChatMessage>> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(conversation).cloned().unwrap_or_default())
    }

    async fn replace(&self, conversation: &str, messages: Vec<ChatMessage>) -> Result<()> {
        let mut conversations = self.conversations.write().await;
        conversations.insert(conversation.to_string(), messages);
        Ok(())
    }

    async fn append(&self, conversation: &str, message: ChatMessage) -> Result<()> {
        let mut conversations = self.conversations.write().await;
        conversations
            .entry(conversation.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn update_last(&self, conversation: &str, message: ChatMessage) -> Result<()> {
        let mut conversations = self.conversations.write().await;
        let messages = conversations.entry(conversation.to_string()).or_default();
        match messages.last_mut() {
            Some(last) => *last = message,
            None => messages.push(message),
        }
        Ok(())
    }
}

/// Append a synthetic user message announcing a scheduled task.
pub async fn inject_scheduled_task(
    store: &dyn MessageStore,
    conversation: &str,
    description: &str,
) -> Result<()> {
    let message = ChatMessage::user_text(&format!("Running scheduled task: {}", description));
    store.append(conversation, message).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_unknown_conversation_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.load("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_and_load() {
        let store = InMemoryStore::new();
        store
            .append("room", ChatMessage::user_text("hi"))
            .await
            .unwrap();
        store
            .append("room", ChatMessage::user_text("again"))
            .await
            .unwrap();

        let messages = store.load("room").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text(), "again");
    }

    #[tokio::test]
    async fn test_update_last_replaces_tail() {
        let store = InMemoryStore::new();
        store
            .append("room", ChatMessage::user_text("one"))
            .await
            .unwrap();
        store
            .update_last("room", ChatMessage::user_text("two"))
            .await
            .unwrap();

        let messages = store.load("room").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text(), "two");
    }

    #[tokio::test]
    async fn test_scheduled_task_message_shape() {
        let store = InMemoryStore::new();
        inject_scheduled_task(&store, "room", "warm up the cache")
            .await
            .unwrap();

        let messages = store.load("room").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].text(),
            "Running scheduled task: warm up the cache"
        );
        assert!(!messages[0].id.is_empty());
        assert!(messages[0]
            .metadata
            .as_ref()
            .and_then(|m| m.created_at)
            .is_some());
    }
}
