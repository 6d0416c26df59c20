//! Conversation history storage
//!
//! Histories are keyed by conversation id and hold role-tagged messages,
//! oldest first. Only the most recent [`MAX_HISTORY`] messages are kept.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::Result;
use crate::integrations::ChatMessage;

/// Messages retained per conversation (ten user/assistant exchanges).
pub const MAX_HISTORY: usize = 20;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Stored messages for a conversation, oldest first. Empty if unknown.
    async fn history(&self, conversation_id: &str) -> Result<Vec<ChatMessage>>;

    /// Append one user/assistant exchange and apply the history cap.
    async fn append_exchange(
        &self,
        conversation_id: &str,
        user_message: &str,
        assistant_message: &str,
    ) -> Result<()>;

    /// Forget a conversation. Returns false if it did not exist.
    async fn clear(&self, conversation_id: &str) -> Result<bool>;

    /// Number of conversations currently held.
    async fn active_conversations(&self) -> Result<usize>;
}

/// Process-local store. Lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Drop the oldest messages so at most `max` remain, removing whole
/// exchanges from the front.
fn truncate_history(messages: &mut Vec<ChatMessage>, max: usize) {
    if messages.len() <= max {
        return;
    }
    let mut excess = messages.len() - max;
    if excess % 2 == 1 {
        excess += 1;
    }
    messages.drain(..excess.min(messages.len()));
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn history(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
        let conversations = self.conversations.lock().await;
        Ok(conversations
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_exchange(
        &self,
        conversation_id: &str,
        user_message: &str,
        assistant_message: &str,
    ) -> Result<()> {
        let mut conversations = self.conversations.lock().await;
        let messages = conversations.entry(conversation_id.to_string()).or_default();

        messages.push(ChatMessage::user(user_message));
        messages.push(ChatMessage::assistant(assistant_message));
        truncate_history(messages, MAX_HISTORY);

        info!(
            "Conversation {} updated. History length: {}",
            conversation_id,
            messages.len()
        );
        Ok(())
    }

    async fn clear(&self, conversation_id: &str) -> Result<bool> {
        let removed = self
            .conversations
            .lock()
            .await
            .remove(conversation_id)
            .is_some();
        if removed {
            info!("Conversation {} cleared", conversation_id);
        }
        Ok(removed)
    }

    async fn active_conversations(&self) -> Result<usize> {
        Ok(self.conversations.lock().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(message: &ChatMessage) -> &str {
        message.content.as_deref().unwrap_or_default()
    }

    #[tokio::test]
    async fn unknown_conversation_has_empty_history() {
        let store = InMemoryConversationStore::new();
        assert!(store.history("nope").await.unwrap().is_empty());
        assert_eq!(store.active_conversations().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn exchange_is_stored_in_order() {
        let store = InMemoryConversationStore::new();
        store.append_exchange("c1", "hi", "hello").await.unwrap();

        let history = store.history("c1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(content(&history[0]), "hi");
        assert_eq!(history[1].role, "assistant");
        assert_eq!(content(&history[1]), "hello");
    }

    #[tokio::test]
    async fn eleventh_turn_evicts_the_first() {
        let store = InMemoryConversationStore::new();
        for turn in 1..=11 {
            store
                .append_exchange("c1", &format!("question {turn}"), &format!("answer {turn}"))
                .await
                .unwrap();
        }

        let history = store.history("c1").await.unwrap();
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(content(&history[0]), "question 2");
        assert_eq!(history[0].role, "user");
        assert_eq!(content(&history[19]), "answer 11");
    }

    #[tokio::test]
    async fn history_never_exceeds_cap() {
        let store = InMemoryConversationStore::new();
        for turn in 0..50 {
            store
                .append_exchange("c1", &turn.to_string(), "ok")
                .await
                .unwrap();
            assert!(store.history("c1").await.unwrap().len() <= MAX_HISTORY);
        }
    }

    #[test]
    fn odd_excess_drops_a_whole_exchange() {
        let mut messages: Vec<ChatMessage> = (0..5).map(|i| ChatMessage::user(i.to_string())).collect();
        truncate_history(&mut messages, 4);
        assert_eq!(messages.len(), 3);
        assert_eq!(content(&messages[0]), "2");
    }

    #[tokio::test]
    async fn clear_removes_conversation() {
        let store = InMemoryConversationStore::new();
        store.append_exchange("c1", "a", "b").await.unwrap();
        store.append_exchange("c2", "a", "b").await.unwrap();
        assert_eq!(store.active_conversations().await.unwrap(), 2);

        assert!(store.clear("c1").await.unwrap());
        assert!(!store.clear("c1").await.unwrap());
        assert_eq!(store.active_conversations().await.unwrap(), 1);
        assert!(store.history("c1").await.unwrap().is_empty());
    }
}
