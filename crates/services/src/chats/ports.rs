use crate::chats::models::{ChatId, ChatSession, MessageId, Settings, StreamingMessage};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Point lookup of a settings record
    async fn get_settings(&self, id: &str) -> Result<Option<Settings>>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn get_message(&self, id: MessageId) -> Result<Option<StreamingMessage>>;

    /// Create the message empty and incomplete, or reset it to that state
    async fn begin_message(&self, id: MessageId) -> Result<StreamingMessage>;

    /// Overwrite the stored content and completion flag.
    /// Returns `false` when no such message exists.
    async fn update_content(&self, id: MessageId, content: &str, complete: bool) -> Result<bool>;
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn get_chat(&self, id: ChatId) -> Result<Option<ChatSession>>;

    async fn create_chat(&self, id: ChatId) -> Result<ChatSession>;

    /// Atomically add `tokens` to the chat's total.
    /// Returns `false` when no such chat exists.
    async fn add_tokens(&self, id: ChatId, tokens: i64) -> Result<bool>;
}
