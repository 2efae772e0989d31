//! In-memory state sink for tests
//!
//! Implements every chat repository port over mutex-guarded maps and keeps a
//! log of each content write so tests can assert on intermediate states.

use crate::chats::{
    ChatId, ChatRepository, ChatSession, MessageId, MessageRepository, Settings,
    SettingsRepository, StreamingMessage,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
pub struct InMemoryChatStore {
    settings: Mutex<HashMap<String, Settings>>,
    messages: Mutex<HashMap<MessageId, StreamingMessage>>,
    chats: Mutex<HashMap<ChatId, ChatSession>>,
    content_writes: Mutex<HashMap<MessageId, Vec<String>>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_settings(&self, settings: Settings) {
        self.settings
            .lock()
            .await
            .insert(settings.id.clone(), settings);
    }

    /// Every content value written to a message, in order
    pub async fn content_writes(&self, id: MessageId) -> Vec<String> {
        self.content_writes
            .lock()
            .await
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SettingsRepository for InMemoryChatStore {
    async fn get_settings(&self, id: &str) -> Result<Option<Settings>> {
        Ok(self.settings.lock().await.get(id).cloned())
    }
}

#[async_trait]
impl MessageRepository for InMemoryChatStore {
    async fn get_message(&self, id: MessageId) -> Result<Option<StreamingMessage>> {
        Ok(self.messages.lock().await.get(&id).cloned())
    }

    async fn begin_message(&self, id: MessageId) -> Result<StreamingMessage> {
        let message = StreamingMessage {
            id,
            content: String::new(),
            complete: false,
        };
        self.messages.lock().await.insert(id, message.clone());
        self.content_writes.lock().await.remove(&id);
        Ok(message)
    }

    async fn update_content(&self, id: MessageId, content: &str, complete: bool) -> Result<bool> {
        let mut messages = self.messages.lock().await;
        let Some(message) = messages.get_mut(&id) else {
            return Ok(false);
        };
        message.content = content.to_string();
        message.complete = complete;

        self.content_writes
            .lock()
            .await
            .entry(id)
            .or_default()
            .push(content.to_string());
        Ok(true)
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatStore {
    async fn get_chat(&self, id: ChatId) -> Result<Option<ChatSession>> {
        Ok(self.chats.lock().await.get(&id).cloned())
    }

    async fn create_chat(&self, id: ChatId) -> Result<ChatSession> {
        let mut chats = self.chats.lock().await;
        let chat = chats.entry(id).or_insert(ChatSession {
            id,
            total_tokens: 0,
        });
        Ok(chat.clone())
    }

    async fn add_tokens(&self, id: ChatId, tokens: i64) -> Result<bool> {
        let mut chats = self.chats.lock().await;
        match chats.get_mut(&id) {
            Some(chat) => {
                chat.total_tokens += tokens;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_unknown_message_reports_missing() {
        let store = InMemoryChatStore::new();
        assert!(!store
            .update_content(MessageId::new(), "x", false)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_begin_message_resets_content() {
        let store = InMemoryChatStore::new();
        let id = MessageId::new();
        store.begin_message(id).await.unwrap();
        store.update_content(id, "partial", false).await.unwrap();

        let message = store.begin_message(id).await.unwrap();

        assert_eq!(message.content, "");
        assert!(store.content_writes(id).await.is_empty());
    }

    #[tokio::test]
    async fn test_create_chat_keeps_existing_total() {
        let store = InMemoryChatStore::new();
        let id = ChatId::new();
        store.create_chat(id).await.unwrap();
        store.add_tokens(id, 7).await.unwrap();

        let chat = store.create_chat(id).await.unwrap();

        assert_eq!(chat.total_tokens, 7);
    }
}
